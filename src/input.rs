//! Parsing of user-supplied URLs and result selections.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Longest URL accepted from user input.
pub const MAX_URL_LENGTH: usize = 2000;

#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\]]+"#).expect("URL regex is valid")
});

/// Problems with user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// The text contained no http(s) URL at all.
    #[error("no URLs found in input\n  Suggestion: Paste book page links starting with http:// or https://")]
    NoUrls,

    /// A candidate exceeded [`MAX_URL_LENGTH`].
    #[error("URL too long ({length} chars, max {MAX_URL_LENGTH})")]
    TooLong {
        /// Length of the rejected candidate.
        length: usize,
    },

    /// A candidate could not be parsed.
    #[error("malformed URL '{url}': {reason}")]
    Malformed {
        /// The candidate text.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A search result selection was not understood.
    #[error("invalid selection '{0}'\n  Suggestion: Use result numbers separated by commas, e.g. 1,3")]
    InvalidSelection(String),

    /// A selected result number does not exist.
    #[error("result {index} does not exist (only {available} results)")]
    SelectionOutOfRange {
        /// The 1-based number given.
        index: usize,
        /// Number of results available.
        available: usize,
    },
}

/// URLs found in free text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractedUrls {
    /// Valid URLs in first-seen order, duplicates removed.
    pub urls: Vec<String>,
    /// Candidates that looked like URLs but failed validation.
    pub rejected: Vec<InputError>,
}

/// Finds every http(s) URL in `text`, one or many per line.
///
/// Trailing sentence punctuation is trimmed and duplicates are collapsed.
#[must_use]
#[tracing::instrument(skip(text), fields(input_len = text.len()))]
pub fn extract_urls(text: &str) -> ExtractedUrls {
    let mut seen = HashSet::new();
    let mut extracted = ExtractedUrls::default();

    for found in URL_PATTERN.find_iter(text) {
        let candidate = trim_trailing_punctuation(found.as_str());
        trace!(url = %candidate, "URL candidate");
        match validate_url(candidate) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    extracted.urls.push(url);
                } else {
                    debug!(url = %url, "duplicate URL skipped");
                }
            }
            Err(error) => {
                debug!(error = %error, "URL candidate rejected");
                extracted.rejected.push(error);
            }
        }
    }
    extracted
}

/// Like [`extract_urls`], but requires at least one valid URL.
///
/// # Errors
///
/// Returns the first rejection, or [`InputError::NoUrls`] when nothing
/// URL-like was found.
pub fn require_urls(text: &str) -> Result<Vec<String>, InputError> {
    let ExtractedUrls { urls, mut rejected } = extract_urls(text);
    if !urls.is_empty() {
        return Ok(urls);
    }
    if rejected.is_empty() {
        Err(InputError::NoUrls)
    } else {
        Err(rejected.swap_remove(0))
    }
}

/// Parses a 1-based result selection such as `1,3` or `2-4` into 0-based indices.
///
/// # Errors
///
/// Returns [`InputError::InvalidSelection`] for unparseable parts and
/// [`InputError::SelectionOutOfRange`] for numbers beyond `available`.
pub fn parse_selection(selection: &str, available: usize) -> Result<Vec<usize>, InputError> {
    let mut indices = Vec::new();
    let invalid = || InputError::InvalidSelection(selection.to_string());

    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_number(a).ok_or_else(invalid)?, parse_number(b).ok_or_else(invalid)?),
            None => {
                let n = parse_number(part).ok_or_else(invalid)?;
                (n, n)
            }
        };
        if start == 0 || end < start {
            return Err(invalid());
        }
        for index in start..=end {
            if index > available {
                return Err(InputError::SelectionOutOfRange { index, available });
            }
            if !indices.contains(&(index - 1)) {
                indices.push(index - 1);
            }
        }
    }

    if indices.is_empty() {
        return Err(invalid());
    }
    Ok(indices)
}

fn parse_number(raw: &str) -> Option<usize> {
    raw.trim().parse().ok()
}

fn trim_trailing_punctuation(url: &str) -> &str {
    let mut result = url;
    while let Some(last) = result.chars().last() {
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' => result = &result[..result.len() - 1],
            ')' => {
                let opens = result.matches('(').count();
                let closes = result.matches(')').count();
                if closes > opens {
                    result = &result[..result.len() - 1];
                } else {
                    break;
                }
            }
            _ => break,
        }
    }
    result
}

fn validate_url(raw: &str) -> Result<String, InputError> {
    if raw.len() > MAX_URL_LENGTH {
        return Err(InputError::TooLong { length: raw.len() });
    }
    let parsed = Url::parse(raw).map_err(|e| InputError::Malformed {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.host().is_none() {
        return Err(InputError::Malformed {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(parsed.to_string())
}
