//! HTTP request pipeline.
//!
//! Layers, innermost first:
//! - [`TransportClient`] sends one request with the cookie jar attached
//! - [`RedirectingFetcher`] follows redirects manually, bounded to 20 hops
//! - [`ResponseFormatter`] turns the outcome into an [`HttpResult`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use catalog_fetch_core::{CatalogClient, FetchConfig, FixedLocale, MemoryRepository, RequestOptions};
//!
//! # async fn example() {
//! let client = CatalogClient::new(
//!     Arc::new(MemoryRepository::new()),
//!     FetchConfig::default(),
//!     Arc::new(FixedLocale::new("en-US")),
//! );
//! let result = client
//!     .fetch_formatted("https://catalog.example/opds", RequestOptions::get(), None)
//!     .await;
//! println!("success: {}", result.is_success);
//! # }
//! ```

mod abort;
mod error;
mod formatter;
mod options;
mod redirect;
mod transport;

pub use abort::{AbortSignal, ListenerId};
pub use error::{FetchError, FetchErrorKind};
pub use formatter::{HttpResult, ResponseFormatter};
pub use options::{RequestOptions, TlsPolicy};
pub use redirect::{RedirectStep, RedirectingFetcher, is_redirect, next_redirect_step};
pub use transport::TransportClient;
