//! Postgame - post-match practice automation
//!
//! Command-line front end over the core library: browse and edit the
//! scenario catalog, manage community maps, edit settings and dry-run
//! the match-end automation.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use postgame_core::settings::DataPaths;

mod maps_cli;
mod packs_cli;
mod settings_cli;
mod simulate;

/// Trace modules for structured tracing
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Engine,
    Catalog,
    Acquisition,
    Settings,
    All,
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "postgame",
    about = "Load practice content automatically after a match",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable structured tracing (comma-separated: engine,catalog,acquisition,settings,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Override the data directory
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Browse and edit practice scenarios
    Packs(packs_cli::PacksCommand),

    /// Search, install and remove community maps
    Maps(maps_cli::MapsCommand),

    /// Show and change automation settings
    Settings(settings_cli::SettingsCommand),

    /// Dry-run the match-end automation against the current settings
    Simulate(simulate::SimulateCommand),
}

fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule]) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    for module in trace_modules {
        let directive = match module {
            TraceModule::Engine => "postgame_core::engine=trace",
            TraceModule::Catalog => "postgame_core::catalog=trace",
            TraceModule::Acquisition => "postgame_core::acquisition=trace",
            TraceModule::Settings => "postgame_core::settings=trace",
            TraceModule::All => "postgame_core=trace",
        };

        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    // Logs go to stderr; stdout carries command output
    if !trace_modules.is_empty() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();

        tracing::info!(trace_modules = ?trace_modules, "Postgame tracing enabled");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn resolve_paths(data_dir: Option<PathBuf>) -> Result<DataPaths> {
    let paths = match data_dir {
        Some(dir) => DataPaths::at(dir),
        None => DataPaths::discover()?,
    };
    paths
        .ensure()
        .with_context(|| format!("Failed to prepare data directory {}", paths.root.display()))?;
    Ok(paths)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, &cli.trace);

    let paths = resolve_paths(cli.data_dir)?;

    match cli.command {
        Command::Packs(command) => command.execute(&paths).await,
        Command::Maps(command) => command.execute(&paths).await,
        Command::Settings(command) => command.execute(&paths),
        Command::Simulate(command) => command.execute(&paths).await,
    }
}
