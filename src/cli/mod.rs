//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Fan-out test runner
#[derive(Parser, Debug)]
#[command(name = "fanrun")]
#[command(version = "0.1.0")]
#[command(about = "Run one test suite on many targets at once and merge the results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the suite on every target
    Run(RunArgs),

    /// Print a finished run from its output directory
    Show(ShowArgs),

    /// Export a finished run to JSON or CSV
    Export(ExportArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Application artifact
    #[arg(long)]
    pub app: Option<PathBuf>,

    /// Test suite artifact
    #[arg(long)]
    pub suite: Option<PathBuf>,

    /// Target to run on; repeat or comma-separate for several
    #[arg(short, long = "target", value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Output directory (wiped before the run)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report title
    #[arg(long)]
    pub title: Option<String>,

    /// Runner program
    #[arg(long)]
    pub runner: Option<String>,

    /// Runner arguments, after `--`
    #[arg(last = true)]
    pub runner_args: Vec<String>,

    /// Per-target timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Maximum targets running at once
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl RunArgs {
    /// Overlay flags given on the command line onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(app) = &self.app {
            config.application = Some(app.clone());
        }
        if let Some(suite) = &self.suite {
            config.suite = Some(suite.clone());
        }
        if !self.targets.is_empty() {
            config.targets = self.targets.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(title) = &self.title {
            config.title = title.clone();
        }
        if let Some(runner) = &self.runner {
            config.runner.program = runner.clone();
        }
        if !self.runner_args.is_empty() {
            config.runner.args = self.runner_args.clone();
        }
        if let Some(timeout) = self.timeout {
            config.target_timeout_secs = Some(timeout);
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = Some(max);
        }
    }
}

/// Arguments for show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Output directory of a finished run
    pub output: PathBuf,

    /// Only show this target
    #[arg(short, long)]
    pub target: Option<String>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for export command
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Output directory of a finished run
    pub output: PathBuf,

    /// Destination file
    pub file: PathBuf,

    /// Export format (json, csv); guessed from the extension when omitted
    #[arg(short, long)]
    pub format: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination
        #[arg(default_value = "fanrun.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "fanrun",
            "run",
            "--app",
            "app.apk",
            "--suite",
            "tests.apk",
            "-t",
            "dev1,dev2",
            "--target",
            "dev3",
            "-j",
            "2",
            "--",
            "--serial",
            "{target}",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.app, Some(PathBuf::from("app.apk")));
                assert_eq!(run.targets, vec!["dev1", "dev2", "dev3"]);
                assert_eq!(run.max_concurrent, Some(2));
                assert_eq!(run.runner_args, vec!["--serial", "{target}"]);
                assert_eq!(run.format, "table");
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_args_override_config() {
        let args = Args::parse_from(["fanrun", "run", "-t", "dev9", "--timeout", "5"]);
        let Command::Run(run) = args.command else {
            panic!("Expected Run command");
        };

        let mut config = AppConfig {
            targets: vec!["dev1".to_string()],
            title: "From file".to_string(),
            ..Default::default()
        };
        run.apply(&mut config);

        assert_eq!(config.targets, vec!["dev9"]);
        assert_eq!(config.target_timeout_secs, Some(5));
        assert_eq!(config.title, "From file");
    }

    #[test]
    fn test_run_args_are_validated_after_overlay() {
        let args = Args::parse_from(["fanrun", "run", "--timeout", "0"]);
        let Command::Run(run) = args.command else {
            panic!("Expected Run command");
        };

        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        run.apply(&mut config);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target_timeout_secs"));
    }

    #[test]
    fn test_show_args() {
        let args = Args::parse_from(["fanrun", "show", "out", "--target", "dev1", "-v"]);
        assert!(args.verbose);
        match args.command {
            Command::Show(show) => {
                assert_eq!(show.output, PathBuf::from("out"));
                assert_eq!(show.target.as_deref(), Some("dev1"));
            }
            _ => panic!("Expected Show command"),
        }
    }

    #[test]
    fn test_config_init_default_path() {
        let args = Args::parse_from(["fanrun", "config", "init"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, PathBuf::from("fanrun.yaml"));
                assert!(!force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
