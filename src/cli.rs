//! CLI argument definitions using clap derive macros.

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Search audiobook sites and manage the download queue of a self-hosted
/// audiobook downloader.
#[derive(Parser, Debug)]
#[command(name = "audiobook-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Backend base URL (overrides AUDIOBOOK_API_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Access token (overrides AUDIOBOOK_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search all enabled sites, showing per-site progress
    Search(SearchArgs),
    /// Queue book page URLs (arguments or stdin)
    Add(AddArgs),
    /// Show the download queue
    Queue(QueueArgs),
    /// Cancel an active download or delete a finished queue item
    Remove {
        /// Queue item id
        id: i64,
    },
    /// Retry a failed or cancelled download
    Retry {
        /// Queue item id
        id: i64,
    },
    /// Browse or prune the download history
    History(HistoryArgs),
    /// List searchable sites
    Sites,
    /// Exchange the password (read from stdin) for an access token
    Login,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration (token redacted)
    Show,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SearchArgs {
    /// Title, author or keywords
    pub query: String,

    /// Restrict to a site (repeatable)
    #[arg(long = "site", value_name = "SITE")]
    pub sites: Vec<String>,

    /// Maximum results (1-100, default from config)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: Option<u32>,

    /// Queue the listed result numbers afterwards, e.g. 1,3 or 2-4
    #[arg(long, value_name = "SELECTION")]
    pub add: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AddArgs {
    /// Book page URLs; read from stdin when omitted
    pub urls: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct QueueArgs {
    /// Keep watching: live push updates plus periodic refresh, until Ctrl-C
    #[arg(short, long)]
    pub watch: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct HistoryArgs {
    /// Page number (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Entries per page (1-100)
    #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: u32,

    /// Filter by title or author
    #[arg(short, long)]
    pub search: Option<String>,

    /// Delete the history entry with this id instead of listing
    #[arg(long, value_name = "ID", conflicts_with_all = ["page", "search"])]
    pub delete: Option<i64>,
}
