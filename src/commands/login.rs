//! Login command handler: trade the shared password for an access token.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::app_config::TOKEN_ENV;
use crate::context::RunContext;

pub async fn run_login_command(ctx: &RunContext) -> Result<()> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("No password given\n  Suggestion: echo \"$PASSWORD\" | audiobook-dl login");
    }

    let client = ctx.api_client()?;
    let token = client.login(password).await?;
    info!(token_type = %token.token_type, "login succeeded");

    // The token goes to stdout so `eval "$(audiobook-dl login)"` works.
    println!("export {TOKEN_ENV}={}", token.access_token);
    if !ctx.quiet {
        eprintln!("Logged in. Export the token above to use it in later commands.");
    }
    Ok(())
}
