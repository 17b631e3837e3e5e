//! # nestml
//!
//! Batch compiler front-end for the NESTML spiking neuron/synapse DSL: runs
//! C1 through C8 over every discovered `.nestml` file and reports
//! diagnostics, exiting 0 on success, 1 if any ERROR was produced, 2 if
//! any FATAL was produced.
//!
//! ```bash
//! # Compile a single model
//! nestml model.nestml
//!
//! # Compile every .nestml file under a directory, relaxing dev CoCos
//! nestml models/ --dev
//!
//! # Use an external ODE solver and persist the full diagnostics log
//! nestml models/ --solver-command ode-solver --store-log
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use nestml_cli::config::{ConfigOverrides, LoggingLevel, PipelineConfig};
use nestml_cli::discover::discover_sources;
use nestml_cli::pipeline::run_pipeline;
use nestml_cli::render::{progress_bar, render_summary, render_unit};
use nestml_solver::transport::Transport;

/// Compile NESTML neuron and synapse models through C1-C8.
#[derive(Debug, Parser)]
#[command(name = "nestml", version, about)]
struct Cli {
    /// A single `.nestml` file or a directory to recurse into.
    input_path: Option<PathBuf>,

    /// Optional TOML config file; CLI flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where generated artifacts would be written (consumed by the
    /// out-of-scope code generator; recorded here for its benefit).
    #[arg(long)]
    target_path: Option<PathBuf>,

    /// Root directory package/artifact names are derived relative to.
    #[arg(long)]
    model_root: Option<PathBuf>,

    #[arg(long, value_enum)]
    logging_level: Option<LoggingLevelArg>,

    #[arg(long)]
    module_name: Option<String>,

    #[arg(long)]
    suffix: Option<String>,

    /// Relax a documented subset of CoCos from ERROR to WARN.
    #[arg(long)]
    dev: bool,

    /// Persist the full diagnostics log as JSON next to `target_path`.
    #[arg(long)]
    store_log: bool,

    /// External ODE solver executable. Without it, every model with an
    /// `equations` block falls back to numeric-mode with a WARN.
    #[arg(long)]
    solver_command: Option<PathBuf>,

    #[arg(long)]
    solver_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LoggingLevelArg {
    Info,
    Warn,
    Error,
}

impl From<LoggingLevelArg> for LoggingLevel {
    fn from(value: LoggingLevelArg) -> Self {
        match value {
            LoggingLevelArg::Info => LoggingLevel::Info,
            LoggingLevelArg::Warn => LoggingLevel::Warn,
            LoggingLevelArg::Error => LoggingLevel::Error,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        input_path: cli.input_path,
        target_path: cli.target_path,
        model_root: cli.model_root,
        logging_level: cli.logging_level.map(Into::into),
        module_name: cli.module_name,
        suffix: cli.suffix,
        dev: cli.dev,
        store_log: cli.store_log,
        solver_command: cli.solver_command,
        solver_timeout_secs: cli.solver_timeout_secs,
    };

    let config = PipelineConfig::load(cli.config.as_ref(), overrides).context("loading pipeline configuration")?;

    env_logger::Builder::new().filter_level(config.logging_level.to_level_filter()).init();

    let files = discover_sources(&config.input_path).context("discovering source files")?;
    if files.is_empty() {
        log::warn!("no .nestml files found under {}", config.input_path.display());
    }

    let transport = Transport::configured(config.solver_command.clone());

    let pb = progress_bar(files.len() as u64);
    let result = run_pipeline(&files, &config, &transport);

    for report in &result.reports {
        pb.set_message(report.file.display().to_string());
        pb.inc(1);
        render_unit(report);
    }
    pb.finish_and_clear();
    let summary = result.log.summary();
    render_summary(&summary);

    if config.store_log {
        let target_dir = config.target_path.clone().unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&target_dir).context("creating target_path directory for --store-log")?;
        let log_path = target_dir.join("diagnostics.json");
        let json = serde_json::to_string_pretty(&result.log.snapshot()).context("serializing diagnostics log")?;
        std::fs::write(&log_path, json).with_context(|| format!("writing {}", log_path.display()))?;
        log::info!("wrote diagnostics log to {}", log_path.display());
    }

    std::process::exit(summary.exit_code());
}
