// src/main.rs
// Slunk entry point: parses the CLI, sets up rotating file logging (stdout is
// reserved for MCP JSON-RPC traffic), and dispatches to a subcommand.

use anyhow::Result;
use clap::Parser;
use slunk::cli::{Cli, Commands, ConfigAction};
use slunk::config::Config;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::FmtSubscriber;

/// Build the diagnostic-log writer: a daily-rotating, 5-file-retained,
/// non-blocking file writer under `config.log_dir` (spec §6), falling back
/// to stderr if the log directory can't be created or opened. Never writes
/// to stdout, which in `serve` mode carries JSON-RPC responses.
fn build_log_writer(log_dir: &std::path::Path) -> (BoxMakeWriter, Option<WorkerGuard>) {
    if std::fs::create_dir_all(log_dir).is_err() {
        return (BoxMakeWriter::new(std::io::stderr), None);
    }
    let appender = RollingBuilder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix("slunk")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir);
    match appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        Err(_) => (BoxMakeWriter::new(std::io::stderr), None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    // `serve` is driven over stdio by an MCP client; anything above WARN on
    // the log file is fine, but stdout must stay untouched JSON-RPC.
    let log_level = match &cli.command {
        None | Some(Commands::Serve) => Level::WARN,
        Some(Commands::Monitor { .. }) | Some(Commands::Index) | Some(Commands::Stats) => {
            Level::INFO
        }
        Some(Commands::Config { .. }) => Level::WARN,
    };
    let (writer, _log_guard) = build_log_writer(&config.log_dir);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(writer)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    for warning in config.validate() {
        tracing::warn!(%warning, "configuration warning");
    }

    match cli.command {
        None | Some(Commands::Serve) => slunk::cli::serve::run(config).await?,
        Some(Commands::Monitor { interval_ms }) => {
            slunk::cli::monitor::run(config, interval_ms).await?
        }
        Some(Commands::Index) => slunk::cli::index::run(config).await?,
        Some(Commands::Stats) => slunk::cli::stats::run(config).await?,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => slunk::cli::config_cmd::show(&config)?,
            ConfigAction::Set { key, value } => slunk::cli::config_cmd::set(&key, &value)?,
        },
    }

    Ok(())
}
