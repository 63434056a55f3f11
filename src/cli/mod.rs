// src/cli/mod.rs
// CLI surface (spec §6 process model): `slunk serve|monitor|index|config|stats`.

pub mod config_cmd;
pub mod index;
pub mod monitor;
pub mod serve;
pub mod stats;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "slunk")]
#[command(about = "Local capture-and-search for workplace chat")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP server over stdio (default).
    Serve,

    /// Run the observer loop: watch the chat app's window and ingest
    /// snapshots on a tick, without serving MCP tool calls.
    Monitor {
        /// Observation tick interval, in milliseconds.
        #[arg(long, default_value_t = 2_000)]
        interval_ms: u64,
    },

    /// Re-run the embedding sweep once over all pending messages and exit.
    Index,

    /// Inspect or change persisted configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print store summary counts and exit.
    Stats,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration as JSON.
    Show,
    /// Set one key in the config file (e.g. `embedding_dim 768`).
    Set { key: String, value: String },
}
