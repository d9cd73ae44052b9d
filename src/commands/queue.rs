//! Queue command handler: one-shot listing or live watch mode.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Result, bail};
use audiobook_core::{
    EventStreamClient, QueueReconciler, QueueWatcher, WatchCommand, WatcherHandle, require_urls,
};
use tracing::{debug, info, warn};

use crate::cli::QueueArgs;
use crate::context::RunContext;
use crate::output;

/// Commands accepted on stdin while watching.
pub const WATCH_HELP: &str =
    "Commands: remove <id> | retry <id> | add <url>... | refresh | quit  (Ctrl-C to exit)";

pub async fn run_queue_command(ctx: &RunContext, args: QueueArgs) -> Result<()> {
    let client = ctx.authed_client()?;
    if !args.watch {
        let mut queue = QueueReconciler::new();
        queue.replace(client.fetch_queue().await?);
        for line in output::render_queue(&queue, None, ctx.width) {
            println!("{line}");
        }
        return Ok(());
    }

    let (watcher, handle) = QueueWatcher::new(
        Arc::new(client.clone()),
        ctx.effective.client.poll_interval,
    );
    let events = EventStreamClient::new(&client);
    let subscription = events.on_event(watcher.push_forwarder());
    info!(
        live = events.is_enabled(),
        poll_secs = ctx.effective.client.poll_interval.as_secs(),
        "watching queue"
    );

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            signal_handle.shutdown();
        }
    });
    spawn_command_reader(handle);

    let clear_screen = io::stdout().is_terminal();
    let width = ctx.width;
    let quiet = ctx.quiet;
    if !quiet {
        println!("{WATCH_HELP}");
    }
    let final_queue = watcher
        .run(move |queue, notice| {
            if quiet && notice.is_none_or(|n| !n.is_error()) {
                return;
            }
            let mut stdout = io::stdout().lock();
            if clear_screen {
                let _ = write!(stdout, "\x1b[2J\x1b[H");
                let _ = writeln!(stdout, "{WATCH_HELP}");
            } else {
                let _ = writeln!(stdout, "---");
            }
            for line in output::render_queue(queue, notice, width) {
                let _ = writeln!(stdout, "{line}");
            }
            let _ = stdout.flush();
        })
        .await;

    subscription.unsubscribe();
    info!(items = final_queue.len(), "stopped watching queue");
    Ok(())
}

/// Reads watch commands on a plain thread; a blocked stdin read must not
/// hold up runtime shutdown.
fn spawn_command_reader(handle: WatcherHandle) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(error) => {
                    warn!(error = %error, "failed to read watch command");
                    return;
                }
            };
            match parse_watch_command(&line) {
                Ok(Some(command)) => {
                    if !handle.send(command) {
                        return;
                    }
                }
                Ok(None) => {}
                Err(error) => eprintln!("{error:#}"),
            }
        }
        debug!("stdin closed, watch commands disabled");
    });
}

/// Parses one line typed during `queue --watch`.
fn parse_watch_command(line: &str) -> Result<Option<WatchCommand>> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = parts.collect();
    let item_id = || -> Result<i64> {
        match rest.as_slice() {
            [id] => id
                .trim_start_matches('#')
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid queue item id '{id}'")),
            _ => bail!("Usage: {verb} <id>"),
        }
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "remove" | "rm" | "cancel" => WatchCommand::Remove(item_id()?),
        "retry" => WatchCommand::Retry(item_id()?),
        "add" => WatchCommand::Add(require_urls(&rest.join(" "))?),
        "refresh" | "r" => WatchCommand::Refresh,
        "quit" | "q" | "exit" => WatchCommand::Shutdown,
        other => bail!("Unknown command '{other}'. {WATCH_HELP}"),
    };
    Ok(Some(command))
}
