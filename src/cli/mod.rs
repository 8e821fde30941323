pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{AiFilter, SortMode};

#[derive(Parser)]
#[command(name = "wallfeed")]
#[command(about = "Wallpaper discovery with an infinite feed", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/wallfeed/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the feed and print it
    Feed {
        /// Extra load-more rounds after the initial load
        #[arg(short, long, default_value_t = 0)]
        more: usize,
    },
    /// Probe one batch of IDs
    Scan {
        /// Highest ID to probe (default: scanner.start_id)
        #[arg(long)]
        cursor: Option<u64>,

        /// Number of IDs to probe (default: scanner.batch_size)
        #[arg(short, long)]
        batch: Option<usize>,
    },
    /// Fetch one page from the paging API
    Page {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        category: Option<String>,

        /// AI filter: all, 0 (exclude) or 1 (only)
        #[arg(long)]
        ai: Option<AiFilter>,

        /// latest, popularity or downloads
        #[arg(long)]
        sort: Option<SortMode>,
    },
    /// Run the periodic scraper until interrupted
    Watch {
        /// Time between runs (e.g., "30m", "1h", "1d")
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the run at startup
        #[arg(long)]
        no_initial: bool,
    },
}
