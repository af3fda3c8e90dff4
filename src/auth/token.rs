//! Stored credentials for one catalog host.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Scheme used when a token record has no `tokenType`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Formats an `Authorization` header value: `"<type> <credentials>"`.
#[must_use]
pub fn authorization_header_value(token_type: &str, credentials: &str) -> String {
    format!("{token_type} {credentials}")
}

/// Credentials stored for one catalog host.
///
/// Secrets are redacted from Debug output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Authentication document URL; its hostname keys the stored record.
    #[serde(
        default,
        alias = "opdsAuthenticationUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub authentication_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticate_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AuthToken")
            .field("id", &self.id)
            .field("authentication_url", &self.authentication_url)
            .field("refresh_url", &self.refresh_url)
            .field("authenticate_url", &self.authenticate_url)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl AuthToken {
    /// Returns `true` when a non-empty access token is present.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        non_empty(self.access_token.as_deref()).is_some()
    }

    /// Returns `true` when both the refresh URL and refresh token are present.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        non_empty(self.refresh_url.as_deref()).is_some()
            && non_empty(self.refresh_token.as_deref()).is_some()
    }

    /// Hostname of `authentication_url`, when it parses.
    #[must_use]
    pub fn hostname(&self) -> Option<String> {
        let url = Url::parse(self.authentication_url.as_deref()?).ok()?;
        url.host_str().map(ToString::to_string)
    }

    /// `Authorization` header value, or `None` without an access token.
    #[must_use]
    pub fn authorization_value(&self) -> Option<String> {
        let credentials = non_empty(self.access_token.as_deref())?;
        let token_type = non_empty(self.token_type.as_deref()).unwrap_or(DEFAULT_TOKEN_TYPE);
        Some(authorization_header_value(token_type, credentials))
    }

    /// Applies a refresh response body.
    ///
    /// `access_token` and `refresh_token` replace the current values only
    /// when present as non-empty strings; anything else keeps the prior value.
    #[must_use]
    pub fn refreshed(mut self, body: &Value) -> Self {
        if let Some(access) = string_field(body, "access_token") {
            self.access_token = Some(access.to_string());
        }
        if let Some(refresh) = string_field(body, "refresh_token") {
            self.refresh_token = Some(refresh.to_string());
        }
        self
    }
}

fn string_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    non_empty(body.get(key)?.as_str())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn token() -> AuthToken {
        AuthToken {
            authentication_url: Some("https://catalog.test/auth.json".to_string()),
            refresh_url: Some("https://catalog.test/refresh".to_string()),
            access_token: Some("old-access".to_string()),
            refresh_token: Some("old-refresh".to_string()),
            ..AuthToken::default()
        }
    }

    #[test]
    fn test_authorization_defaults_to_bearer() {
        assert_eq!(
            token().authorization_value().as_deref(),
            Some("Bearer old-access")
        );

        let custom = AuthToken {
            token_type: Some("MAC".to_string()),
            ..token()
        };
        assert_eq!(custom.authorization_value().as_deref(), Some("MAC old-access"));
    }

    #[test]
    fn test_empty_access_token_is_absent() {
        let empty = AuthToken {
            access_token: Some(String::new()),
            ..token()
        };
        assert!(!empty.has_access_token());
        assert!(empty.authorization_value().is_none());
    }

    #[test]
    fn test_can_refresh_needs_both_fields() {
        assert!(token().can_refresh());
        let no_url = AuthToken {
            refresh_url: None,
            ..token()
        };
        assert!(!no_url.can_refresh());
        let no_token = AuthToken {
            refresh_token: None,
            ..token()
        };
        assert!(!no_token.can_refresh());
    }

    #[test]
    fn test_refreshed_replaces_supplied_fields() {
        let updated = token().refreshed(&json!({"access_token": "new", "refresh_token": "rot"}));
        assert_eq!(updated.access_token.as_deref(), Some("new"));
        assert_eq!(updated.refresh_token.as_deref(), Some("rot"));
    }

    #[test]
    fn test_refreshed_keeps_prior_values_for_missing_or_mistyped_fields() {
        let updated = token().refreshed(&json!({"access_token": "new"}));
        assert_eq!(updated.refresh_token.as_deref(), Some("old-refresh"));

        let mistyped = token().refreshed(&json!({"access_token": 7, "refresh_token": ""}));
        assert_eq!(mistyped.access_token.as_deref(), Some("old-access"));
        assert_eq!(mistyped.refresh_token.as_deref(), Some("old-refresh"));

        let not_object = token().refreshed(&json!("nope"));
        assert_eq!(not_object, token());
    }

    #[test]
    fn test_hostname_from_authentication_url() {
        assert_eq!(token().hostname().as_deref(), Some("catalog.test"));
        assert!(AuthToken::default().hostname().is_none());
    }

    #[test]
    fn test_legacy_field_name_is_accepted() {
        let parsed: AuthToken = serde_json::from_value(json!({
            "opdsAuthenticationUrl": "https://legacy.test/auth",
            "accessToken": "abc",
        }))
        .unwrap();
        assert_eq!(parsed.hostname().as_deref(), Some("legacy.test"));

        let written = serde_json::to_value(&parsed).unwrap();
        assert_eq!(written["authenticationUrl"], "https://legacy.test/auth");
        assert!(written.get("refreshUrl").is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", token());
        assert!(!debug.contains("old-access"));
        assert!(!debug.contains("old-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }
}
