//! Bearer-token authentication.
//!
//! Tokens are stored per catalog host and attached only after the server
//! answered 401 to an anonymous request.

mod flow;
mod store;
mod token;

pub use flow::AuthenticatedGetFlow;
pub use store::{AUTH_TOKEN_PREFIX, AuthStoreError, AuthTokenStore, token_identifier};
pub use token::{AuthToken, DEFAULT_TOKEN_TYPE, authorization_header_value};
