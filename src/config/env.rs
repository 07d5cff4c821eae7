//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "FANRUN";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Report title from FANRUN_TITLE
    pub title: Option<String>,
    /// Output root from FANRUN_OUTPUT_DIR
    pub output_dir: Option<PathBuf>,
    /// Application artifact from FANRUN_APP
    pub application: Option<PathBuf>,
    /// Suite artifact from FANRUN_SUITE
    pub suite: Option<PathBuf>,
    /// Comma-separated targets from FANRUN_TARGETS
    pub targets: Option<Vec<String>>,
    /// Runner program from FANRUN_RUNNER
    pub runner: Option<String>,
    /// Per-target timeout from FANRUN_TIMEOUT
    pub timeout: Option<u64>,
    /// Concurrency cap from FANRUN_MAX_CONCURRENT
    pub max_concurrent: Option<usize>,
    /// Config file from FANRUN_CONFIG
    pub config_file: Option<String>,
    /// Debug logging from FANRUN_DEBUG
    pub debug: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            title: get_env("TITLE"),
            output_dir: get_env("OUTPUT_DIR").map(PathBuf::from),
            application: get_env("APP").map(PathBuf::from),
            suite: get_env("SUITE").map(PathBuf::from),
            targets: get_env("TARGETS").map(|v| split_list(&v)),
            runner: get_env("RUNNER"),
            timeout: get_env_parse("TIMEOUT"),
            max_concurrent: get_env_parse("MAX_CONCURRENT"),
            config_file: get_env("CONFIG"),
            debug: get_env_bool("DEBUG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.title.is_some()
            || self.output_dir.is_some()
            || self.application.is_some()
            || self.suite.is_some()
            || self.targets.is_some()
            || self.runner.is_some()
            || self.timeout.is_some()
            || self.max_concurrent.is_some()
            || self.config_file.is_some()
            || self.debug.is_some()
    }

    /// Overlay every variable that is set onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(title) = &self.title {
            config.title = title.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(app) = &self.application {
            config.application = Some(app.clone());
        }
        if let Some(suite) = &self.suite {
            config.suite = Some(suite.clone());
        }
        if let Some(targets) = &self.targets {
            config.targets = targets.clone();
        }
        if let Some(program) = &self.runner {
            config.runner.program = program.clone();
        }
        if let Some(timeout) = self.timeout {
            config.target_timeout_secs = Some(timeout);
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = Some(max);
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_TITLE:          {:?}", ENV_PREFIX, self.title);
        println!("  {}_OUTPUT_DIR:     {:?}", ENV_PREFIX, self.output_dir);
        println!("  {}_APP:            {:?}", ENV_PREFIX, self.application);
        println!("  {}_SUITE:          {:?}", ENV_PREFIX, self.suite);
        println!("  {}_TARGETS:        {:?}", ENV_PREFIX, self.targets);
        println!("  {}_RUNNER:         {:?}", ENV_PREFIX, self.runner);
        println!("  {}_TIMEOUT:        {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_MAX_CONCURRENT: {:?}", ENV_PREFIX, self.max_concurrent);
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_DEBUG:          {:?}", ENV_PREFIX, self.debug);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Print all FANRUN environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_TITLE           Report title");
    println!("  {ENV_PREFIX}_OUTPUT_DIR      Output root (wiped before each run)");
    println!("  {ENV_PREFIX}_APP             Application artifact");
    println!("  {ENV_PREFIX}_SUITE           Test suite artifact");
    println!("  {ENV_PREFIX}_TARGETS         Comma-separated target ids");
    println!("  {ENV_PREFIX}_RUNNER          Runner program");
    println!("  {ENV_PREFIX}_TIMEOUT         Per-target timeout in seconds");
    println!("  {ENV_PREFIX}_MAX_CONCURRENT  Maximum targets running at once");
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_DEBUG           Enable debug logging (true/false)");
    println!();
    println!("Set for each runner invocation:");
    println!("  {ENV_PREFIX}_TARGET          Target being run");
    println!("  {ENV_PREFIX}_OUTPUT          Target's private output directory");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_TARGETS=emulator-5554,emulator-5556");
    println!("  fanrun run --app app.apk --suite tests.apk");
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.title.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _guard = EnvBuilder::new()
            .var("TARGETS", "emulator-5554, emulator-5556,")
            .var("TIMEOUT", "60")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(
            config.targets,
            Some(vec!["emulator-5554".to_string(), "emulator-5556".to_string()])
        );
        assert_eq!(config.timeout, Some(60));
        assert!(config.has_any());
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = EnvBuilder::new().var("DEBUG", "yes").apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_apply_overrides_only_set_values() {
        let env = EnvConfig {
            title: Some("From env".to_string()),
            max_concurrent: Some(2),
            ..Default::default()
        };
        let mut config = AppConfig {
            targets: vec!["dev1".to_string()],
            ..Default::default()
        };

        env.apply(&mut config);
        assert_eq!(config.title, "From env");
        assert_eq!(config.max_concurrent, Some(2));
        assert_eq!(config.targets, vec!["dev1"]);
    }
}
