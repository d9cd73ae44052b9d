//! Sites command handler.

use anyhow::Result;

use crate::context::RunContext;

pub async fn run_sites_command(ctx: &RunContext) -> Result<()> {
    let client = ctx.authed_client()?;
    let sites = client.list_sites().await?;
    if sites.is_empty() {
        println!("No searchable sites are enabled on the server.");
    }
    for site in sites {
        println!("{site}");
    }
    Ok(())
}
