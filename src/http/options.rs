//! Per-request options.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use super::AbortSignal;

/// Certificate policy for https targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPolicy {
    /// Reject certificates that fail validation.
    pub reject_invalid_certs: bool,
    /// Timeout applied to requests using this policy.
    pub timeout: Duration,
}

/// Options for one logical request.
///
/// Redirects are always handled by [`crate::RedirectingFetcher`]; the
/// transport never follows them, so there is no redirect mode to choose.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Request headers (names are case-insensitive).
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Per-attempt timeout; the configured default applies when unset.
    pub timeout: Option<Duration>,
    /// TLS policy; attached automatically for https targets when unset.
    pub tls: Option<TlsPolicy>,
    /// Cancellation token observed by the transport.
    pub signal: Option<AbortSignal>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            tls: None,
            signal: None,
        }
    }
}

impl RequestOptions {
    /// GET with no headers.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with no headers and no body.
    #[must_use]
    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    /// Sets (replaces) a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `payload` as the body and sets `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `payload` cannot be encoded.
    pub fn with_json_body<T: Serialize + ?Sized>(
        mut self,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(payload)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Returns `true` when an attached signal has fired.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.signal.as_ref().is_some_and(AbortSignal::is_aborted)
    }
}
