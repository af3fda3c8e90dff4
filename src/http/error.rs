//! Structured transport errors.
//!
//! The kind of failure is decided where it happens (transport or redirect
//! loop), so the formatter classifies by [`FetchErrorKind`] rather than by
//! inspecting messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminant of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchErrorKind {
    /// Cancellation was observed.
    Aborted,
    /// The per-attempt timeout elapsed.
    TimedOut,
    /// Any other transport failure (DNS, connect, TLS, client construction).
    Network,
    /// Too many redirect hops.
    RedirectLoop,
    /// The target or a redirect `Location` could not be parsed.
    InvalidUrl,
}

/// Errors raised below the formatting boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The abort signal fired before or during the request.
    #[error("request aborted: {url}")]
    Aborted {
        /// The URL being fetched.
        url: String,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}: {message}")]
    Timeout {
        /// The URL that timed out.
        url: String,
        /// Description reported by the HTTP client.
        message: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Redirect hop counter exceeded.
    #[error("maximum redirect reached at: {url} (hop {hops})")]
    RedirectLoop {
        /// The URL whose response asked for one redirect too many.
        url: String,
        /// Hop index at which the limit was hit.
        hops: u32,
    },

    /// The target URL or redirect location is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The unparseable URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates an aborted error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Maps a client error, promoting timeouts to [`FetchError::Timeout`].
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url, source.to_string())
        } else {
            Self::network(url, source)
        }
    }

    /// Creates a redirect loop error.
    pub fn redirect_loop(url: impl Into<String>, hops: u32) -> Self {
        Self::RedirectLoop {
            url: url.into(),
            hops,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a client construction error.
    pub fn client_build(source: reqwest::Error) -> Self {
        Self::ClientBuild { source }
    }

    /// Returns the failure discriminant.
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Aborted { .. } => FetchErrorKind::Aborted,
            Self::Timeout { .. } => FetchErrorKind::TimedOut,
            Self::Network { .. } | Self::ClientBuild { .. } => FetchErrorKind::Network,
            Self::RedirectLoop { .. } => FetchErrorKind::RedirectLoop,
            Self::InvalidUrl { .. } => FetchErrorKind::InvalidUrl,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL for context.
