//! Authenticated GET with one-shot token refresh.
//!
//! A GET that comes back 401 is retried with the stored token for the host.
//! If that is also rejected and the token is refreshable, the refresh
//! endpoint is called once and the GET retried one last time. The updated
//! token is only written back after the server accepted it.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{AuthToken, AuthTokenStore};
use crate::http::{HttpResult, RequestOptions, ResponseFormatter};

/// Position in the authenticated GET state machine.
#[derive(Debug)]
enum FlowState {
    /// Plain GET, no credentials.
    Anonymous,
    /// GET with the stored token attached.
    AttemptAuthorized {
        token: AuthToken,
        unauthorized: HttpResult,
    },
    /// Authorized GET was rejected; exchange the refresh token and retry once.
    AttemptRefresh {
        token: AuthToken,
        unauthorized: HttpResult,
    },
    /// Final answer for the caller.
    Resolved(HttpResult),
}

/// Decides the next state after looking up credentials for a 401 response.
fn after_lookup(unauthorized: HttpResult, token: Option<AuthToken>) -> FlowState {
    match token {
        Some(token) if token.has_access_token() => FlowState::AttemptAuthorized {
            token,
            unauthorized,
        },
        Some(_) => {
            debug!("stored token has no access token");
            FlowState::Resolved(unauthorized)
        }
        None => {
            debug!("no stored credentials for host");
            FlowState::Resolved(unauthorized)
        }
    }
}

/// Decides the next state after the authorized attempt.
fn after_authorized(result: HttpResult, token: AuthToken) -> FlowState {
    if result.is_unauthorized() && token.can_refresh() {
        FlowState::AttemptRefresh {
            token,
            unauthorized: result,
        }
    } else {
        FlowState::Resolved(result)
    }
}

/// Whether a retried response validates refreshed credentials.
fn accepts_credentials(result: &HttpResult) -> bool {
    result.status_code.is_some_and(|status| status != 401)
}

/// GET with stored credentials and refresh rotation.
pub struct AuthenticatedGetFlow {
    formatter: Arc<ResponseFormatter>,
    tokens: Arc<AuthTokenStore>,
}

impl AuthenticatedGetFlow {
    /// Creates a flow over a shared formatter and token store.
    #[must_use]
    pub fn new(formatter: Arc<ResponseFormatter>, tokens: Arc<AuthTokenStore>) -> Self {
        Self { formatter, tokens }
    }

    /// Fetches `url`, answering a 401 with the stored token when `enable_auth`.
    ///
    /// Every attempt is a bodyless GET whatever method `options` carries.
    /// Refresh is attempted at most once per call. Refresh failures fall back
    /// to the unauthorized result; they are never raised.
    #[instrument(skip(self, options, locale), fields(url = %url))]
    pub async fn get(
        &self,
        url: &str,
        mut options: RequestOptions,
        enable_auth: bool,
        locale: Option<&str>,
    ) -> HttpResult {
        options.method = Method::GET;
        options.body = None;
        self.drive(url, &options, enable_auth, locale, FlowState::Anonymous)
            .await
    }

    async fn drive(
        &self,
        url: &str,
        options: &RequestOptions,
        enable_auth: bool,
        locale: Option<&str>,
        mut state: FlowState,
    ) -> HttpResult {
        loop {
            state = match state {
                FlowState::Anonymous => {
                    let result = self
                        .formatter
                        .fetch_formatted(url, options.clone(), locale)
                        .await;
                    if !enable_auth || !result.is_unauthorized() {
                        FlowState::Resolved(result)
                    } else {
                        let token = match host_of(url) {
                            Some(host) => self.tokens.get(&host).await,
                            None => None,
                        };
                        after_lookup(result, token)
                    }
                }
                FlowState::AttemptAuthorized {
                    token,
                    unauthorized,
                } => match with_authorization(options, &token) {
                    Some(authorized) => {
                        let result = self.formatter.fetch_formatted(url, authorized, locale).await;
                        after_authorized(result, token)
                    }
                    None => FlowState::Resolved(unauthorized),
                },
                FlowState::AttemptRefresh {
                    token,
                    unauthorized,
                } => {
                    if options.is_aborted() {
                        return HttpResult::aborted(url);
                    }
                    let retried = match self.refresh(&token, options, locale).await {
                        Some(updated) => self.retry(url, options, updated, locale).await,
                        None => None,
                    };
                    FlowState::Resolved(retried.unwrap_or(unauthorized))
                }
                FlowState::Resolved(result) => return result,
            };
        }
    }

    /// Exchanges the refresh token; `None` aborts the refresh.
    async fn refresh(
        &self,
        token: &AuthToken,
        options: &RequestOptions,
        locale: Option<&str>,
    ) -> Option<AuthToken> {
        let refresh_url = token.refresh_url.as_deref()?;
        let body = json!({
            "refresh_token": token.refresh_token.as_deref()?,
            "grant_type": "refresh_token",
        });

        let mut request = match RequestOptions::post().with_json_body(&body) {
            Ok(request) => request,
            Err(error) => {
                warn!(error = %error, "failed to encode refresh request");
                return None;
            }
        };
        request.signal.clone_from(&options.signal);

        let mut result = self.formatter.post(refresh_url, request, locale).await;
        if !result.is_success {
            debug!(status = ?result.status_code, "token refresh rejected");
            return None;
        }

        let response = result.take_response()?;
        match response.json::<Value>().await {
            Ok(body) => Some(token.clone().refreshed(&body)),
            Err(error) => {
                warn!(error = %error, "token refresh response is not JSON");
                None
            }
        }
    }

    /// Final authorized GET with refreshed credentials; persists them on acceptance.
    async fn retry(
        &self,
        url: &str,
        options: &RequestOptions,
        token: AuthToken,
        locale: Option<&str>,
    ) -> Option<HttpResult> {
        let authorized = with_authorization(options, &token)?;
        let result = self.formatter.fetch_formatted(url, authorized, locale).await;

        if accepts_credentials(&result) {
            info!("refreshed token accepted");
            if let Err(error) = self.tokens.save(&token).await {
                warn!(error = %error, "failed to persist refreshed token");
            }
        } else {
            debug!(status = ?result.status_code, "refreshed token rejected; not persisted");
        }
        Some(result)
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(ToString::to_string)
}

fn with_authorization(options: &RequestOptions, token: &AuthToken) -> Option<RequestOptions> {
    let value = token.authorization_value()?;
    match HeaderValue::from_str(&value) {
        Ok(mut header) => {
            header.set_sensitive(true);
            Some(options.clone().with_header(AUTHORIZATION, header))
        }
        Err(_) => {
            warn!("stored token is not a valid header value");
            None
        }
    }
}
