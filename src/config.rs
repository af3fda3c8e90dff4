//! Fetch configuration (timeouts, TLS development flag, identification).

use std::time::Duration;

use crate::user_agent;

/// Default per-attempt request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default TCP/TLS connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum redirect hop index that may still be followed.
pub const MAX_REDIRECTS: u32 = 20;

/// Locale used when neither the caller nor the provider supplies one.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Settings shared by every request issued through a [`crate::CatalogClient`].
///
/// Timeouts apply per attempt: each redirect hop and each refresh-related
/// request gets its own budget.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout applied when the caller does not set one.
    pub default_timeout: Duration,
    /// Connect timeout for the underlying client.
    pub connect_timeout: Duration,
    /// Skip certificate validation on https requests. Development only.
    pub accept_invalid_certs: bool,
    /// Value of the `user-agent` header injected on every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            accept_invalid_certs: false,
            user_agent: user_agent::default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Configuration for development builds: certificate validation is skipped.
    #[must_use]
    pub fn development() -> Self {
        Self {
            accept_invalid_certs: true,
            ..Self::default()
        }
    }

    /// Overrides the default per-attempt timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}
