//! Cookie persistence.
//!
//! The jar is serialized in the Netscape cookie-file line format and stored
//! as a string document in the [`crate::ConfigRepository`].

mod jar;
mod netscape;
mod store;

pub use jar::PersistentCookieJar;
pub use netscape::{CookieError, CookieLine};
pub use store::{COOKIE_JAR_IDENTIFIER, CookieJarStore, CookieStoreError};
