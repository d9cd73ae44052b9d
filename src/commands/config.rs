//! Config command handlers: show effective configuration.

use anyhow::Result;

use crate::app_config::redact_token;
use crate::context::RunContext;

pub fn run_config_show_command(ctx: &RunContext) -> Result<()> {
    let client = &ctx.effective.client;

    let resolved_path = ctx.loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if ctx.loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    println!(
        "api_url = {} ({})",
        client.api_url,
        ctx.effective.api_url_source.as_str()
    );
    match ctx.effective.token_source {
        Some(source) => println!(
            "token = {} ({})",
            redact_token(client.token.as_deref()),
            source.as_str()
        ),
        None => println!("token = {}", redact_token(None)),
    }
    println!("poll_interval_secs = {}", client.poll_interval.as_secs());
    println!("connect_timeout_secs = {}", client.connect_timeout.as_secs());
    println!("read_timeout_secs = {}", client.read_timeout.as_secs());
    println!("request_timeout_secs = {}", client.request_timeout.as_secs());
    println!("reconnect_delay_secs = {}", client.reconnect_delay.as_secs());
    println!("search_limit = {}", client.search_limit);

    Ok(())
}
