//! The fetch facade, constructed once per process and shared by reference.

use std::future::Future;
use std::sync::Arc;

use reqwest::Response;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::auth::{AuthStoreError, AuthTokenStore, AuthenticatedGetFlow};
use crate::config::FetchConfig;
use crate::cookies::{CookieJarStore, CookieStoreError};
use crate::http::{FetchError, HttpResult, RedirectingFetcher, RequestOptions, ResponseFormatter};
use crate::locale::LocaleProvider;
use crate::repository::ConfigRepository;

/// Errors raised while wiping stored authentication data.
#[derive(Debug, Error)]
pub enum WipeError {
    /// Cookie jar could not be cleared.
    #[error(transparent)]
    Cookies(#[from] CookieStoreError),
    /// Token records could not be deleted.
    #[error(transparent)]
    Tokens(#[from] AuthStoreError),
}

/// Cookie-aware, token-aware HTTP client for catalog servers.
///
/// Owns the single cookie jar and token store for everything built from the
/// same repository. Clone the surrounding `Arc` rather than building a
/// second client, or the two jars will diverge.
pub struct CatalogClient {
    cookie_store: Arc<CookieJarStore>,
    tokens: Arc<AuthTokenStore>,
    formatter: Arc<ResponseFormatter>,
    auth_flow: AuthenticatedGetFlow,
}

impl CatalogClient {
    /// Wires the pipeline over `repository`. No I/O happens until the first request.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ConfigRepository>,
        config: FetchConfig,
        locale: Arc<dyn LocaleProvider>,
    ) -> Self {
        let cookie_store = Arc::new(CookieJarStore::new(
            Arc::clone(&repository),
            config.clone(),
        ));
        let tokens = Arc::new(AuthTokenStore::new(repository));
        let fetcher = RedirectingFetcher::new(Arc::clone(&cookie_store), locale, config);
        let formatter = Arc::new(ResponseFormatter::new(fetcher));
        let auth_flow = AuthenticatedGetFlow::new(Arc::clone(&formatter), Arc::clone(&tokens));

        Self {
            cookie_store,
            tokens,
            formatter,
            auth_flow,
        }
    }

    /// GET with stored-token retry on 401.
    pub async fn get(&self, url: &str, options: RequestOptions) -> HttpResult {
        self.auth_flow.get(url, options, true, None).await
    }

    /// GET, retrying a 401 with stored credentials only when `enable_auth`.
    pub async fn get_with_auth(
        &self,
        url: &str,
        options: RequestOptions,
        enable_auth: bool,
        locale: Option<&str>,
    ) -> HttpResult {
        self.auth_flow.get(url, options, enable_auth, locale).await
    }

    /// POST through the formatting pipeline. No auth retry.
    pub async fn post(&self, url: &str, options: RequestOptions) -> HttpResult {
        self.formatter.post(url, options, None).await
    }

    /// Any method, classified, with the live response attached.
    pub async fn fetch_formatted(
        &self,
        url: &str,
        options: RequestOptions,
        locale: Option<&str>,
    ) -> HttpResult {
        self.formatter.fetch_formatted(url, options, locale).await
    }

    /// Classified fetch post-processed by `callback`; the live response is
    /// stripped from what the callback returns.
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
        self.formatter
            .fetch_formatted_with(url, options, callback, locale)
            .await
    }

    /// Unclassified fetch: redirects followed, errors returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, cancellation, redirect
    /// loops and malformed URLs.
    pub async fn fetch_raw(
        &self,
        url: &str,
        options: RequestOptions,
        locale: Option<&str>,
    ) -> Result<Response, FetchError> {
        self.formatter.fetcher().fetch(url, options, locale).await
    }

    /// Stored credentials.
    #[must_use]
    pub fn tokens(&self) -> &AuthTokenStore {
        &self.tokens
    }

    /// The jar store shared by every request.
    #[must_use]
    pub fn cookie_store(&self) -> &CookieJarStore {
        &self.cookie_store
    }

    /// Writes the cookie jar back to the repository. Call on shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`CookieStoreError`] when the write fails.
    pub async fn persist_cookies(&self) -> Result<bool, CookieStoreError> {
        self.cookie_store.persist().await.inspect_err(|error| {
            warn!(error = %error, "failed to persist cookie jar");
        })
    }

    /// Forgets all cookies and stored tokens.
    ///
    /// # Errors
    ///
    /// Returns [`WipeError`] naming the store that failed.
    #[instrument(skip(self))]
    pub async fn wipe_auth_data(&self) -> Result<(), WipeError> {
        self.cookie_store.clear().await?;
        let removed = self.tokens.clear().await?;
        info!(tokens = removed, "wiped authentication data");
        Ok(())
    }
}
