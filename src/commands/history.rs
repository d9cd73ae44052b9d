//! History command handler: list or delete finished downloads.

use anyhow::Result;
use audiobook_core::api::DownloadsQuery;
use tracing::info;

use crate::cli::HistoryArgs;
use crate::context::RunContext;
use crate::output;

pub async fn run_history_command(ctx: &RunContext, args: &HistoryArgs) -> Result<()> {
    let client = ctx.authed_client()?;

    if let Some(download_id) = args.delete {
        client.delete_download(download_id).await?;
        info!(download_id, "deleted history entry");
        println!("Deleted download #{download_id}");
        return Ok(());
    }

    let query = DownloadsQuery {
        page: args.page,
        limit: args.limit,
        search: args
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    };
    let page = client.list_downloads(&query).await?;

    if page.items.is_empty() {
        match query.search.as_deref() {
            Some(search) => println!("No downloads matched \"{search}\"."),
            None => println!("No downloads found."),
        }
    } else {
        for record in &page.items {
            println!("{}", output::render_history_row(record, ctx.width));
        }
    }
    println!("{}", output::history_footer(&page));
    Ok(())
}
