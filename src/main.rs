//! fanrun - run one test suite on many targets at once
//!
//! Fans a suite out across every target (devices, emulators, hosts), runs it
//! on each one concurrently through an external runner program, and merges
//! the per-target results into a single summary and report.
//!
//! ## Usage
//!
//! ```bash
//! # Run on two emulators
//! fanrun run --app app.apk --suite tests.apk -t emulator-5554,emulator-5556 \
//!     --runner ./run-suite.sh -- --serial {target} --output {output}
//!
//! # Look at a finished run
//! fanrun show fanrun-output
//!
//! # Export every (target, test) row
//! fanrun export fanrun-output results.csv
//!
//! # Write an example configuration
//! fanrun config init
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::env::{print_env_help, EnvConfig};
use config::{AppConfig, ConfigFile};
use executor::{CommandRunner, Orchestrator};
use output::{OutputFormat, ResultFormatter};
use results::{ExportFormat, ReportModel, ResultsStorage};
use utils::logger::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let mut app = load_config(args.config.as_deref(), &env)?;
    if let cli::Command::Run(run_args) = &args.command {
        run_args.apply(&mut app);
        app.validate().context("Invalid command line options")?;
    }

    let level = args
        .log_level
        .as_deref()
        .and_then(LogLevel::from_str)
        .unwrap_or_else(|| LogLevel::from_debug(args.verbose || app.debug));
    init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => {
            let success = run(app, &run_args.format).await?;
            if !success {
                std::process::exit(1);
            }
        }
        cli::Command::Show(show_args) => {
            show(show_args)?;
        }
        cli::Command::Export(export_args) => {
            export(export_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &app, &env)?;
        }
    }

    Ok(())
}

/// Defaults, then file, then environment
fn load_config(explicit: Option<&Path>, env: &EnvConfig) -> Result<AppConfig> {
    let file = match explicit
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_deref().map(config::file::expand_path))
    {
        Some(path) => ConfigFile::load(&path)?,
        None => ConfigFile::load_default()?,
    };

    let mut app = file.app;
    env.apply(&mut app);
    app.validate().context("Invalid configuration")?;
    Ok(app)
}

fn parse_format(format: &str) -> OutputFormat {
    OutputFormat::from_str(format).unwrap_or_else(|| {
        warn!("Unknown output format '{}', using table", format);
        OutputFormat::Table
    })
}

async fn run(app: AppConfig, format: &str) -> Result<bool> {
    if !app.runner.is_configured() {
        anyhow::bail!("No runner configured. Use --runner or set runner.program in the config file");
    }

    let targets = app.target_ids();
    info!("Running '{}' on {} targets", app.title, targets.len());

    let runner = CommandRunner::new(&app.runner.program).with_args(app.runner.args.clone());
    let mut orchestrator = Orchestrator::new(Arc::new(runner))
        .with_title(&app.title)
        .with_output(&app.output_dir);
    if let Some(application) = &app.application {
        orchestrator = orchestrator.with_application(application);
    }
    if let Some(suite) = &app.suite {
        orchestrator = orchestrator.with_suite(suite);
    }
    if let Some(timeout) = app.target_timeout() {
        orchestrator = orchestrator.with_timeout(timeout);
    }
    if let Some(max) = app.max_concurrent {
        orchestrator = orchestrator.with_max_concurrent(max);
    }

    let summary = orchestrator.run(&targets).await?;
    let report = ReportModel::from_summary(&summary);

    println!("{}", ResultFormatter::new(parse_format(format)).format_report(&report));

    let storage = ResultsStorage::new(&app.output_dir);
    storage.ensure_dir()?;
    storage.save_summary(&summary)?;
    let report_path = storage.save_report(&report)?;
    debug!("Report written to {}", report_path.display());

    Ok(summary.is_success())
}

fn show(args: cli::ShowArgs) -> Result<()> {
    let storage = ResultsStorage::new(&args.output);
    let mut report = storage
        .load_report()
        .with_context(|| format!("No finished run in {}", args.output.display()))?;

    if let Some(target) = &args.target {
        if report.target(target).is_none() {
            anyhow::bail!("Target {} is not part of run {}", target, report.run_id);
        }
        report.targets.retain(|t| &t.target == target);
    }

    println!("{}", ResultFormatter::new(parse_format(&args.format)).format_report(&report));
    Ok(())
}

fn export(args: cli::ExportArgs) -> Result<()> {
    let format = match &args.format {
        Some(f) => ExportFormat::from_str(f)
            .ok_or_else(|| anyhow::anyhow!("Unknown export format: {f}"))?,
        None => ExportFormat::from_extension(&args.file).unwrap_or(ExportFormat::Json),
    };

    let storage = ResultsStorage::new(&args.output);
    let report = storage
        .load_report()
        .with_context(|| format!("No finished run in {}", args.output.display()))?;
    storage.export(&report, &args.file, format)?;

    println!("✓ Exported {} to {}", report.run_id, args.file.display());
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, app: &AppConfig, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            match ConfigFile::find() {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# No configuration file found, using defaults"),
            }
            if env.has_any() {
                println!("# Environment overrides applied");
            }
            println!("{}", serde_yaml::to_string(app)?);
        }

        cli::ConfigAction::Env => {
            print_env_help();
            println!();
            env.print_summary();
        }
    }

    Ok(())
}
