//! Single-request HTTP transport bound to the persistent cookie jar.
//!
//! The client never follows redirects itself: every response, including
//! intermediate 3xx hops, passes through the jar before the caller decides
//! whether to follow.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Response};
use tracing::{debug, instrument};
use url::Url;

use super::{FetchError, RequestOptions, TlsPolicy};
use crate::config::FetchConfig;
use crate::cookies::PersistentCookieJar;

/// Issues one HTTP request at a time with cookies, TLS policy and timeout applied.
///
/// Created once per [`crate::CookieJarStore`] and shared by reference.
#[derive(Debug, Clone)]
pub struct TransportClient {
    verified: Client,
    unverified: Option<Client>,
    jar: Arc<PersistentCookieJar>,
    default_timeout: Duration,
}

impl TransportClient {
    /// Builds the transport around `jar`.
    ///
    /// A second client that skips certificate validation is only built when
    /// `config.accept_invalid_certs` is set.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    #[instrument(level = "debug", skip(jar, config))]
    pub fn new(jar: Arc<PersistentCookieJar>, config: &FetchConfig) -> Result<Self, FetchError> {
        let verified = base_client_builder(&jar, config)
            .build()
            .map_err(FetchError::client_build)?;

        let unverified = if config.accept_invalid_certs {
            debug!("certificate validation disabled for development");
            Some(
                base_client_builder(&jar, config)
                    .danger_accept_invalid_certs(true)
                    .build()
                    .map_err(FetchError::client_build)?,
            )
        } else {
            None
        };

        Ok(Self {
            verified,
            unverified,
            jar,
            default_timeout: config.default_timeout,
        })
    }

    /// The jar shared with the underlying client.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<PersistentCookieJar> {
        &self.jar
    }

    /// Sends exactly one request; redirects are returned, not followed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Aborted`] when the signal fires before or during the call
    /// - [`FetchError::Timeout`] when the per-attempt timeout elapses
    /// - [`FetchError::Network`] for any other transport failure
    #[instrument(level = "debug", skip(self, options), fields(url = %url, method = %options.method))]
    pub async fn send(&self, url: &Url, options: &RequestOptions) -> Result<Response, FetchError> {
        if options.is_aborted() {
            return Err(FetchError::aborted(url.as_str()));
        }

        let timeout = options
            .timeout
            .or(options.tls.map(|tls| tls.timeout))
            .unwrap_or(self.default_timeout);

        let mut request = self
            .client_for(options.tls)
            .request(options.method.clone(), url.clone())
            .headers(options.headers.clone())
            .timeout(timeout);
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let outcome = match &options.signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    () = signal.cancelled() => return Err(FetchError::aborted(url.as_str())),
                    result = request.send() => result,
                }
            }
            None => request.send().await,
        };

        let response = outcome.map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
        debug!(status = response.status().as_u16(), "response received");
        Ok(response)
    }

    fn client_for(&self, tls: Option<TlsPolicy>) -> &Client {
        match (tls, &self.unverified) {
            (Some(policy), Some(unverified)) if !policy.reject_invalid_certs => unverified,
            _ => &self.verified,
        }
    }
}

fn base_client_builder(jar: &Arc<PersistentCookieJar>, config: &FetchConfig) -> ClientBuilder {
    Client::builder()
        .cookie_provider(Arc::clone(jar))
        .redirect(Policy::none())
        .connect_timeout(config.connect_timeout)
        .timeout(config.default_timeout)
        .gzip(true)
}
