//! Manual, bounded redirect following.
//!
//! Following hops here instead of inside the HTTP client guarantees that
//! `Set-Cookie` headers from every intermediate response reach the jar
//! before the next hop is requested.

use std::sync::Arc;

use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_LENGTH, HeaderValue, LOCATION, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{FetchError, RequestOptions, TlsPolicy};
use crate::config::{DEFAULT_LOCALE, FetchConfig, MAX_REDIRECTS};
use crate::cookies::CookieJarStore;
use crate::locale::LocaleProvider;
use crate::user_agent;

/// Status codes that carry a `Location` to follow.
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Returns `true` for 301, 302, 303, 307 and 308.
#[must_use]
pub fn is_redirect(status: StatusCode) -> bool {
    REDIRECT_STATUSES.contains(&status.as_u16())
}

/// Outcome of inspecting one response in a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectStep {
    /// Return the response to the caller.
    Done,
    /// Request `location` next.
    Follow {
        /// Absolute target resolved against the response URL.
        location: Url,
        /// Switch to GET and drop the body before the next hop.
        downgrade_to_get: bool,
    },
}

/// Decides what to do with a response received at hop `hops`.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] when `location` cannot be resolved
/// - [`FetchError::RedirectLoop`] when `hops` exceeds [`MAX_REDIRECTS`]
pub fn next_redirect_step(
    status: StatusCode,
    location: Option<&str>,
    response_url: &Url,
    method: &Method,
    hops: u32,
) -> Result<RedirectStep, FetchError> {
    if !is_redirect(status) {
        return Ok(RedirectStep::Done);
    }

    let Some(location) = location else {
        debug!(status = status.as_u16(), "no location URL to redirect");
        return Ok(RedirectStep::Done);
    };

    let target = response_url
        .join(location)
        .map_err(|_| FetchError::invalid_url(location))?;

    if hops > MAX_REDIRECTS {
        return Err(FetchError::redirect_loop(response_url.as_str(), hops));
    }

    let downgrade_to_get = status == StatusCode::SEE_OTHER
        || ((status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND)
            && *method == Method::POST);

    Ok(RedirectStep::Follow {
        location: target,
        downgrade_to_get,
    })
}

/// Wraps the transport with header injection and manual redirect handling.
pub struct RedirectingFetcher {
    cookie_store: Arc<CookieJarStore>,
    locale: Arc<dyn LocaleProvider>,
    config: FetchConfig,
}

impl RedirectingFetcher {
    /// Creates a fetcher sharing `cookie_store`'s transport.
    #[must_use]
    pub fn new(
        cookie_store: Arc<CookieJarStore>,
        locale: Arc<dyn LocaleProvider>,
        config: FetchConfig,
    ) -> Self {
        Self {
            cookie_store,
            locale,
            config,
        }
    }

    /// Fetches `url`, following redirects until a non-redirect response.
    ///
    /// `locale` overrides the provider for `accept-language`; both fall back
    /// to `en-US`. Each hop gets its own timeout budget.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] for malformed URLs, redirect loops,
    /// cancellation and transport failures.
    #[instrument(skip(self, options, locale), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        options: RequestOptions,
        locale: Option<&str>,
    ) -> Result<Response, FetchError> {
        let transport = self.cookie_store.get_or_create().await?;
        let mut current = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        let mut options = self.prepare(options, locale);
        let mut hops: u32 = 0;

        loop {
            if options.is_aborted() {
                return Err(FetchError::aborted(current.as_str()));
            }

            let hop_options = self.with_tls_policy(&options, &current);
            let response = transport.send(&current, &hop_options).await?;

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok());
            let step = next_redirect_step(
                response.status(),
                location,
                response.url(),
                &options.method,
                hops,
            )?;

            match step {
                RedirectStep::Done => return Ok(response),
                RedirectStep::Follow {
                    location,
                    downgrade_to_get,
                } => {
                    debug!(
                        status = response.status().as_u16(),
                        to = %location,
                        hop = hops + 1,
                        "following redirect"
                    );
                    if downgrade_to_get {
                        options.method = Method::GET;
                        options.body = None;
                        options.headers.remove(CONTENT_LENGTH);
                    }
                    current = location;
                    hops += 1;
                }
            }
        }
    }

    /// Injects identification headers and the per-attempt timeout.
    ///
    /// An explicit timeout wins over the caller's TLS policy, which wins over
    /// the configured default.
    fn prepare(&self, mut options: RequestOptions, locale: Option<&str>) -> RequestOptions {
        let locale = self.resolve_locale(locale);

        match HeaderValue::from_str(&self.config.user_agent) {
            Ok(value) => {
                options.headers.insert(USER_AGENT, value);
            }
            Err(_) => warn!("configured user agent is not a valid header value; omitting it"),
        }
        let accept_language = HeaderValue::from_str(&user_agent::accept_language(&locale))
            .unwrap_or_else(|_| {
                HeaderValue::from_static("en-US,en-US;q=0.7,en;q=0.5")
            });
        options.headers.insert(ACCEPT_LANGUAGE, accept_language);

        options.timeout = options
            .timeout
            .or(options.tls.map(|tls| tls.timeout))
            .or(Some(self.config.default_timeout));
        options
    }

    fn resolve_locale(&self, locale: Option<&str>) -> String {
        locale
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
            .or_else(|| self.locale.locale())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
    }

    /// Attaches the configured TLS policy to https hops without one.
    fn with_tls_policy(&self, options: &RequestOptions, target: &Url) -> RequestOptions {
        let mut hop = options.clone();
        if hop.tls.is_none() && target.scheme() == "https" {
            hop.tls = Some(TlsPolicy {
                reject_invalid_certs: !self.config.accept_invalid_certs,
                timeout: options.timeout.unwrap_or(self.config.default_timeout),
            });
        }
        hop
    }
}
