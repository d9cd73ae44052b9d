//! Shared runtime context built after CLI/config handling.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use audiobook_core::ApiClient;
use tracing::debug;

use crate::app_config::{
    EffectiveConfig, LoadedConfig, Overrides, load_default_file_config, resolve_client_config,
};
use crate::cli::Args;
use crate::output;
use crate::terminal;

/// Holds what every command needs so handlers take one argument instead of many.
pub(crate) struct RunContext {
    pub(crate) loaded: LoadedConfig,
    pub(crate) effective: EffectiveConfig,
    pub(crate) quiet: bool,
    pub(crate) show_progress: bool,
    pub(crate) width: usize,
}

impl RunContext {
    pub(crate) fn from_args(args: &Args) -> Result<Self> {
        let loaded = load_default_file_config()?;
        debug!(
            path = ?loaded.path,
            loaded = loaded.loaded_from_file,
            "config file resolved"
        );
        let cli = Overrides {
            api_url: args.api_url.clone(),
            token: args.token.clone(),
        };
        let effective = resolve_client_config(&cli, &Overrides::from_env(), loaded.config.as_ref())?;

        Ok(Self {
            loaded,
            effective,
            quiet: args.quiet,
            show_progress: terminal::should_show_progress(
                std::io::stderr().is_terminal(),
                args.quiet,
                terminal::is_dumb_terminal(),
            ),
            width: output::terminal_width(),
        })
    }

    /// Client for endpoints that work without a token (login).
    pub(crate) fn api_client(&self) -> Result<ApiClient> {
        ApiClient::new(self.effective.client.clone()).context("Failed to initialize HTTP client")
    }

    /// Client for protected endpoints; fails before any request without a token.
    pub(crate) fn authed_client(&self) -> Result<ApiClient> {
        let client = self.api_client()?;
        client.require_token()?;
        Ok(client)
    }
}
