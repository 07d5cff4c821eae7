//! Suite metadata lookup
//!
//! Resolves the package names of the application and the test suite. They are
//! only used for logging, but failing to resolve them means the inputs are
//! not what the user thinks they are, so it stops the run before dispatch.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifying metadata of the artifacts under test
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteInfo {
    pub application_package: String,
    pub suite_package: String,
}

/// Reads identifying metadata out of the artifacts
pub trait ManifestInspector: Send + Sync {
    fn inspect(&self, application: &Path, suite: &Path) -> Result<SuiteInfo>;
}

/// Uses a `<artifact>.manifest.json` sidecar when present, the file stem otherwise
#[derive(Clone, Copy, Debug, Default)]
pub struct FileNameInspector;

#[derive(Deserialize)]
struct Sidecar {
    package: String,
}

impl FileNameInspector {
    fn package_of(path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Artifact has no usable file name: {}", path.display()))?;

        let sidecar = path.with_file_name(format!("{file_name}.manifest.json"));
        if sidecar.exists() {
            let content = std::fs::read_to_string(&sidecar)
                .with_context(|| format!("Failed to read {}", sidecar.display()))?;
            let parsed: Sidecar = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", sidecar.display()))?;
            return Ok(parsed.package);
        }

        path.file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .with_context(|| format!("Artifact has no usable file name: {}", path.display()))
    }
}

impl ManifestInspector for FileNameInspector {
    fn inspect(&self, application: &Path, suite: &Path) -> Result<SuiteInfo> {
        Ok(SuiteInfo {
            application_package: Self::package_of(application)?,
            suite_package: Self::package_of(suite)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_stem_fallback() {
        let info = FileNameInspector
            .inspect(Path::new("/apks/app-debug.apk"), Path::new("/apks/app-tests.apk"))
            .unwrap();
        assert_eq!(info.application_package, "app-debug");
        assert_eq!(info.suite_package, "app-tests");
    }

    #[test]
    fn test_sidecar_wins() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("app.apk");
        std::fs::write(&app, b"").unwrap();
        std::fs::write(
            dir.path().join("app.apk.manifest.json"),
            r#"{"package":"com.example.app"}"#,
        )
        .unwrap();

        let info = FileNameInspector.inspect(&app, Path::new("/x/tests.apk")).unwrap();
        assert_eq!(info.application_package, "com.example.app");
    }

    #[test]
    fn test_broken_sidecar_is_an_error() {
        let dir = tempdir().unwrap();
        let app = dir.path().join("app.apk");
        std::fs::write(dir.path().join("app.apk.manifest.json"), "not json").unwrap();

        assert!(FileNameInspector.inspect(&app, &app).is_err());
    }
}
