//! Search command handler: streamed catalog search with a progress bar.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use audiobook_core::{SearchController, SearchRequest, SearchResult, parse_selection};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::cli::SearchArgs;
use crate::context::RunContext;
use crate::output;

pub async fn run_search_command(ctx: &RunContext, args: &SearchArgs) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        bail!("Search query must not be empty");
    }
    let client = ctx.authed_client()?;
    let limit = args.limit.unwrap_or(ctx.effective.client.search_limit);
    let request = SearchRequest::new(query, args.sites.clone(), limit);

    let bar = ctx.show_progress.then(new_progress_bar);
    let mut controller = SearchController::new();
    let outcome = controller
        .start_search(&client, &request, |progress| {
            if let Some(bar) = bar.as_ref() {
                bar.set_length(u64::from(progress.total_sites));
                bar.set_position(u64::from(progress.current_site));
                bar.set_message(progress.message.clone());
            }
        })
        .await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let results = outcome.map_err(|error| anyhow!("Search failed: {}", error.user_message()))?;

    if results.is_empty() {
        println!("No results found for \"{query}\".");
    } else {
        for (index, result) in results.iter().enumerate() {
            println!("{}", output::render_search_row(index + 1, result, ctx.width));
        }
    }

    if let Some(selection) = args.add.as_deref() {
        let urls = selected_urls(&results, selection)?;
        let added = client.add_to_queue(&urls).await?;
        info!(count = added.len(), "queued selected results");
        println!("Added {} item(s) to queue", added.len());
    }
    Ok(())
}

fn selected_urls(results: &[SearchResult], selection: &str) -> Result<Vec<String>> {
    if results.is_empty() {
        bail!("Nothing to add: the search returned no results");
    }
    let indices = parse_selection(selection, results.len())?;
    Ok(indices
        .into_iter()
        .map(|index| results[index].url.clone())
        .collect())
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
