//! Identification headers sent with every catalog request.

/// Default `user-agent` product token (fixed for a given build).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("catalog-fetch/{version}")
}

/// Builds the `accept-language` value with its English fallback chain.
#[must_use]
pub(crate) fn accept_language(locale: &str) -> String {
    format!("{locale},en-US;q=0.7,en;q=0.5")
}
