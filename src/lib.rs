//! Catalog Fetch Core Library
//!
//! Authenticated HTTP fetch layer used to retrieve remote catalog and resource
//! data from servers that require session cookies and/or bearer tokens with
//! refresh rotation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Transport, manual redirect following and result classification
//! - [`cookies`] - Persistent cookie jar and its lazily-created store
//! - [`auth`] - Per-host token records and the authenticated GET state machine
//! - [`repository`] - Key-value persistence backends (memory, SQLite)
//! - [`client`] - [`CatalogClient`], the facade constructed once per process
//! - [`config`] - Timeouts, TLS development flag, user agent
//! - [`locale`] - Active locale lookup for `accept-language`

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod cookies;
pub mod http;
pub mod locale;
pub mod repository;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use auth::{
    AUTH_TOKEN_PREFIX, AuthStoreError, AuthToken, AuthTokenStore, AuthenticatedGetFlow,
    authorization_header_value, token_identifier,
};
pub use client::{CatalogClient, WipeError};
pub use config::{DEFAULT_LOCALE, DEFAULT_TIMEOUT_SECS, FetchConfig, MAX_REDIRECTS};
pub use cookies::{
    COOKIE_JAR_IDENTIFIER, CookieError, CookieJarStore, CookieLine, CookieStoreError,
    PersistentCookieJar,
};
pub use http::{
    AbortSignal, FetchError, FetchErrorKind, HttpResult, ListenerId, RedirectStep,
    RedirectingFetcher, RequestOptions, ResponseFormatter, TlsPolicy, TransportClient,
    next_redirect_step,
};
pub use locale::{FixedLocale, LocaleProvider};
pub use repository::{
    ConfigDocument, ConfigRepository, MemoryRepository, RepositoryError, SqliteRepository,
};
