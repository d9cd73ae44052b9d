//! CLI entry point for audiobook-dl.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;
mod context;
mod output;
mod terminal;

use cli::{Args, Command, ConfigCommand};
use context::RunContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let no_color = terminal::should_disable_color(
        args.no_color,
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    let force_cli_level = args.quiet || args.verbose > 0;
    terminal::init_tracing(
        terminal::default_log_level(args.verbose, args.quiet),
        force_cli_level,
        no_color,
    );
    debug!(command = ?args.command, verbose = args.verbose, "CLI arguments parsed");

    let ctx = RunContext::from_args(&args)?;

    match &args.command {
        Command::Search(search) => commands::run_search_command(&ctx, search).await,
        Command::Add(add) => commands::run_add_command(&ctx, add).await,
        Command::Queue(queue) => commands::run_queue_command(&ctx, *queue).await,
        Command::Remove { id } => commands::run_remove_command(&ctx, *id).await,
        Command::Retry { id } => commands::run_retry_command(&ctx, *id).await,
        Command::History(history) => commands::run_history_command(&ctx, history).await,
        Command::Sites => commands::run_sites_command(&ctx).await,
        Command::Login => commands::run_login_command(&ctx).await,
        Command::Config {
            command: ConfigCommand::Show,
        } => commands::run_config_show_command(&ctx),
    }
}
