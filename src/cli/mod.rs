pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "octofeed")]
#[command(about = "Relays GitHub activity feeds into chat groups", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/octofeed/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database holding subscriptions and watermarks
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe a group to a user's activity feed
    Add {
        /// Bot session id
        bot_id: i64,
        /// Group id
        group_id: i64,
        /// GitHub user whose activity to follow
        source: String,
    },
    /// Unsubscribe a group from a feed
    Remove {
        bot_id: i64,
        group_id: i64,
        source: String,
    },
    /// List the feeds a group follows
    List { bot_id: i64, group_id: i64 },
    /// List every known feed with its watermark
    Sources,
    /// Poll continuously until interrupted
    Run {
        /// Delay between cycles (e.g., "10s", "5m", "1h")
        #[arg(short, long)]
        interval: Option<String>,

        /// Deadline for one cycle (e.g., "5m")
        #[arg(short, long)]
        timeout: Option<String>,

        /// Sleep before the first cycle
        #[arg(long)]
        no_initial_run: bool,
    },
    /// Run a single cycle and exit
    Once,
    /// Stop the running poller
    Stop,
    /// Check whether a poller is running
    Status,
}
