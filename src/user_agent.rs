//! User-Agent sent on every backend request.

/// Client name reported to the backend.
const CLIENT_NAME: &str = "audiobook-dl";

/// Default User-Agent: client name, crate version and platform.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        "{CLIENT_NAME}/{version} ({}; {})",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
