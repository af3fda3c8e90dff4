//! Converts raw responses and transport errors into classified results.
//!
//! Callers above this layer never see a [`FetchError`]; they inspect the
//! flags on [`HttpResult`] instead.

use std::future::Future;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{FetchError, FetchErrorKind, RedirectingFetcher, RequestOptions};

/// Uniform outcome of a fetch.
///
/// Exactly one of `is_success`, `is_abort`, `is_timeout` or a plain
/// `is_network_error` describes the outcome; `is_failure` is set whenever
/// `is_success` is not. The live `response` handle is never serialized.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResult<T = ()> {
    /// Status was 2xx.
    pub is_success: bool,
    /// Anything other than success.
    pub is_failure: bool,
    /// Cancelled through an [`super::AbortSignal`].
    pub is_abort: bool,
    /// No usable response (transport failure, timeout, redirect loop).
    pub is_network_error: bool,
    /// The network error was a timeout.
    pub is_timeout: bool,
    /// Requested URL.
    pub url: String,
    /// Effective URL of the final response.
    pub response_url: Option<String>,
    /// HTTP status of the final response.
    pub status_code: Option<u16>,
    /// Reason phrase, or the error description for network failures.
    pub status_message: Option<String>,
    /// `Content-Type` of the final response.
    pub content_type: Option<String>,
    /// Discriminant of the transport error, if any.
    pub error_kind: Option<FetchErrorKind>,
    /// Data attached by a callback.
    pub data: Option<T>,
    /// Live response, available until a callback consumed or the result was detached.
    #[serde(skip)]
    pub response: Option<Response>,
}

impl HttpResult {
    /// Classifies a completed response.
    #[must_use]
    pub fn from_response(url: impl Into<String>, response: Response) -> Self {
        let status = response.status();
        let is_success = status.is_success();
        Self {
            is_success,
            is_failure: !is_success,
            is_abort: false,
            is_network_error: false,
            is_timeout: false,
            url: url.into(),
            response_url: Some(response.url().to_string()),
            status_code: Some(status.as_u16()),
            status_message: Some(status.canonical_reason().unwrap_or_default().to_string()),
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string),
            error_kind: None,
            data: None,
            response: Some(response),
        }
    }

    /// Classifies a transport error by its kind.
    #[must_use]
    pub fn from_error(url: impl Into<String>, error: &FetchError) -> Self {
        let kind = error.kind();
        if kind == FetchErrorKind::Aborted {
            return Self::aborted(url);
        }

        Self {
            is_success: false,
            is_failure: true,
            is_abort: false,
            is_network_error: true,
            is_timeout: kind == FetchErrorKind::TimedOut,
            url: url.into(),
            response_url: None,
            status_code: None,
            status_message: Some(error.to_string()),
            content_type: None,
            error_kind: Some(kind),
            data: None,
            response: None,
        }
    }

    /// Result for a cancelled request.
    #[must_use]
    pub fn aborted(url: impl Into<String>) -> Self {
        Self {
            is_success: false,
            is_failure: true,
            is_abort: true,
            is_network_error: false,
            is_timeout: false,
            url: url.into(),
            response_url: None,
            status_code: None,
            status_message: None,
            content_type: None,
            error_kind: Some(FetchErrorKind::Aborted),
            data: None,
            response: None,
        }
    }
}

impl<T> HttpResult<T> {
    /// Returns `true` for a 401 response.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == Some(401)
    }

    /// Takes the live response out of the result.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Drops the live response so the result can cross a serialization boundary.
    #[must_use]
    pub fn detached(mut self) -> Self {
        self.response = None;
        self
    }

    /// Replaces the attached data, keeping the classification.
    #[must_use]
    pub fn with_data<U>(self, data: U) -> HttpResult<U> {
        HttpResult {
            is_success: self.is_success,
            is_failure: self.is_failure,
            is_abort: self.is_abort,
            is_network_error: self.is_network_error,
            is_timeout: self.is_timeout,
            url: self.url,
            response_url: self.response_url,
            status_code: self.status_code,
            status_message: self.status_message,
            content_type: self.content_type,
            error_kind: self.error_kind,
            data: Some(data),
            response: self.response,
        }
    }
}

/// Fetches through the redirecting layer and classifies the outcome.
pub struct ResponseFormatter {
    fetcher: RedirectingFetcher,
}

impl ResponseFormatter {
    /// Wraps `fetcher`.
    #[must_use]
    pub fn new(fetcher: RedirectingFetcher) -> Self {
        Self { fetcher }
    }

    /// The wrapped fetcher, for callers that need the raw response.
    #[must_use]
    pub fn fetcher(&self) -> &RedirectingFetcher {
        &self.fetcher
    }

    /// Fetches `url` and returns a classified result holding the live response.
    #[instrument(skip(self, options, locale), fields(url = %url, method = %options.method))]
    pub async fn fetch_formatted(
        &self,
        url: &str,
        options: RequestOptions,
        locale: Option<&str>,
    ) -> HttpResult {
        match self.fetcher.fetch(url, options, locale).await {
            Ok(response) => {
                let result = HttpResult::from_response(url, response);
                debug!(
                    status = ?result.status_code,
                    content_type = ?result.content_type,
                    "formatted response"
                );
                result
            }
            Err(error) => {
                debug!(error = %error, kind = ?error.kind(), "fetch failed");
                HttpResult::from_error(url, &error)
            }
        }
    }

    /// Fetches `url`, hands the result to `callback`, and returns its output
    /// with the live response stripped.
    pub async fn fetch_formatted_with<T, F, Fut>(
        &self,
        url: &str,
        options: RequestOptions,
        callback: F,
        locale: Option<&str>,
    ) -> HttpResult<T>
    where
        F: FnOnce(HttpResult) -> Fut,
        Fut: Future<Output = HttpResult<T>>,
    {
        let result = self.fetch_formatted(url, options, locale).await;
        callback(result).await.detached()
    }

    /// Same pipeline with the method forced to POST.
    pub async fn post(
        &self,
        url: &str,
        mut options: RequestOptions,
        locale: Option<&str>,
    ) -> HttpResult {
        options.method = Method::POST;
        self.fetch_formatted(url, options, locale).await
    }
}

#[cfg(test)]
impl HttpResult {
    /// Builds a response-less result with the given status, for state tests.
    pub(crate) fn synthetic(url: &str, status: u16) -> Self {
        let is_success = (200..300).contains(&status);
        Self {
            is_success,
            is_failure: !is_success,
            is_abort: false,
            is_network_error: false,
            is_timeout: false,
            url: url.to_string(),
            response_url: Some(url.to_string()),
            status_code: Some(status),
            status_message: None,
            content_type: None,
            error_kind: None,
            data: None,
            response: None,
        }
    }
}
