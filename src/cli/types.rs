//! CLI command definitions for the activation-core binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "activation-core")]
#[command(about = "Operational CLI for the bot activation core", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the activation config file (overrides ACTIVATION_CONFIG_PATH)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bot registry and state inspection
    #[command(subcommand)]
    Bots(BotsCommands),

    /// Tail events flowing through the event bus
    Events {
        /// Emit raw JSON events instead of a human-readable line
        #[arg(long)]
        json: bool,

        /// Stop after printing this many events (0 = run until interrupted)
        #[arg(long, default_value = "0")]
        count: usize,
    },

    /// Manually trigger a bot run, bypassing intent matching
    Run {
        /// Configured bot name
        bot: String,
    },
}

#[derive(Subcommand)]
pub enum BotsCommands {
    /// List all configured bots with their current state
    List,

    /// Show full state for a single bot
    Show {
        /// Configured bot name
        name: String,
    },
}
