//! Application configuration loading: file, environment and CLI layers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use audiobook_core::ClientConfig;

/// Environment variable overriding the backend URL.
pub const API_URL_ENV: &str = "AUDIOBOOK_API_URL";
/// Environment variable carrying the access token.
pub const TOKEN_ENV: &str = "AUDIOBOOK_TOKEN";

/// Values read from `config.toml`. The token is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Backend base URL.
    pub api_url: Option<String>,
    /// Seconds between queue snapshots in watch mode.
    pub poll_interval_secs: Option<u64>,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Idle read timeout for streamed responses in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Whole-request timeout for REST calls in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Base push reconnect delay in seconds.
    pub reconnect_delay_secs: Option<u64>,
    /// Default number of search results.
    pub search_limit: Option<u32>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_secs("poll_interval_secs", self.poll_interval_secs)?;
        validate_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_secs("read_timeout_secs", self.read_timeout_secs)?;
        validate_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_secs("reconnect_delay_secs", self.reconnect_delay_secs)?;

        if let Some(limit) = self.search_limit
            && !(1..=100).contains(&limit)
        {
            bail!("Invalid config value for `search_limit`: {limit}. Expected range: 1..=100");
        }
        Ok(())
    }
}

fn validate_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/audiobook-dl/config.toml`
/// 2. `$HOME/.config/audiobook-dl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("audiobook-dl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("audiobook-dl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let seconds = |field: &str| {
            parse_integer_u64(value)
                .with_context(|| format!("Invalid `{field}` value on line {line_no}"))
        };

        match key {
            "api_url" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `api_url` value on line {line_no}"))?;
                cfg.api_url = Some(parsed);
            }
            "poll_interval_secs" => cfg.poll_interval_secs = Some(seconds(key)?),
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(seconds(key)?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(seconds(key)?),
            "request_timeout_secs" => cfg.request_timeout_secs = Some(seconds(key)?),
            "reconnect_delay_secs" => cfg.reconnect_delay_secs = Some(seconds(key)?),
            "search_limit" => {
                let parsed = seconds(key)?;
                let limit = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("search_limit out of range for u32"))?;
                cfg.search_limit = Some(limit);
            }
            "token" | "access_token" => {
                bail!(
                    "`{key}` on line {line_no} is not read from the config file; set {TOKEN_ENV} or pass --token"
                );
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

/// Where an effective value came from, for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Cli,
    Env,
    File,
    Default,
}

impl ValueSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "command line",
            Self::Env => "environment",
            Self::File => "config file",
            Self::Default => "default",
        }
    }
}

/// Values given on the command line or in the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
}

impl Overrides {
    /// Reads [`API_URL_ENV`] and [`TOKEN_ENV`]; blank values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_url: env_var_non_empty(API_URL_ENV),
            token: env_var_non_empty(TOKEN_ENV),
        }
    }
}

/// The client configuration plus provenance of the layered values.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub client: ClientConfig,
    pub api_url_source: ValueSource,
    pub token_source: Option<ValueSource>,
}

/// Layers CLI > environment > file > defaults into a validated [`ClientConfig`].
pub fn resolve_client_config(
    cli: &Overrides,
    env: &Overrides,
    file: Option<&FileConfig>,
) -> Result<EffectiveConfig> {
    let file_url = file.and_then(|f| f.api_url.clone());
    let (api_url, api_url_source) = if let Some(url) = cli.api_url.clone() {
        (Some(url), ValueSource::Cli)
    } else if let Some(url) = env.api_url.clone() {
        (Some(url), ValueSource::Env)
    } else if let Some(url) = file_url {
        (Some(url), ValueSource::File)
    } else {
        (None, ValueSource::Default)
    };

    let mut client = match api_url {
        Some(url) => ClientConfig::with_api_url(&url).with_context(|| {
            format!("Invalid backend URL from {}", api_url_source.as_str())
        })?,
        None => ClientConfig::default(),
    };

    if let Some(file) = file {
        let secs = Duration::from_secs;
        if let Some(v) = file.poll_interval_secs {
            client.poll_interval = secs(v);
        }
        if let Some(v) = file.connect_timeout_secs {
            client.connect_timeout = secs(v);
        }
        if let Some(v) = file.read_timeout_secs {
            client.read_timeout = secs(v);
        }
        if let Some(v) = file.request_timeout_secs {
            client.request_timeout = secs(v);
        }
        if let Some(v) = file.reconnect_delay_secs {
            client.reconnect_delay = secs(v);
        }
        if let Some(v) = file.search_limit {
            client.search_limit = v;
        }
    }

    let (token, token_source) = if cli.token.is_some() {
        (cli.token.clone(), Some(ValueSource::Cli))
    } else if env.token.is_some() {
        (env.token.clone(), Some(ValueSource::Env))
    } else {
        (None, None)
    };
    let client = client.with_token(token);
    let token_source = token_source.filter(|_| client.token.is_some());

    client.validate()?;
    Ok(EffectiveConfig {
        client,
        api_url_source,
        token_source,
    })
}

/// Shows a token as its length only.
#[must_use]
pub fn redact_token(token: Option<&str>) -> String {
    match token {
        Some(token) => format!("<redacted, {} chars>", token.chars().count()),
        None => "<not set>".to_string(),
    }
}
