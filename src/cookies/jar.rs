//! Cookie jar that can be written to and restored from a text blob.
//!
//! `reqwest::cookie::Jar` does the request-side matching; the jar keeps a
//! parallel list of [`CookieLine`] records so it can be serialized.

use std::fmt;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

use super::netscape::{CookieError, CookieLine, decode_cookie_file, encode_cookie_file};

/// Cookie store shared by every request of a [`crate::TransportClient`].
#[derive(Default)]
pub struct PersistentCookieJar {
    jar: RwLock<Jar>,
    records: Mutex<Vec<CookieLine>>,
}

impl fmt::Debug for PersistentCookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCookieJar")
            .field("cookies", &self.len())
            .finish_non_exhaustive()
    }
}

impl PersistentCookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar holding `cookies`; expired entries are dropped.
    #[must_use]
    pub fn from_cookies(cookies: Vec<CookieLine>) -> Self {
        let now = unix_now();
        let jar = Jar::default();
        let mut records = Vec::with_capacity(cookies.len());

        for cookie in cookies {
            if cookie.is_expired_at(now) {
                continue;
            }
            match cookie.replay_origin() {
                Some(origin) => {
                    jar.add_cookie_str(&cookie.replay_header(), &origin);
                    records.push(cookie);
                }
                None => warn!(
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "skipping cookie with unparseable domain"
                ),
            }
        }

        Self {
            jar: RwLock::new(jar),
            records: Mutex::new(records),
        }
    }

    /// Restores a jar from [`PersistentCookieJar::serialize`] output.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError`] when the blob lacks the jar header or any line
    /// is malformed.
    pub fn deserialize(blob: &str) -> Result<Self, CookieError> {
        decode_cookie_file(blob).map(Self::from_cookies)
    }

    /// Encodes every unexpired cookie, one line each.
    #[must_use]
    pub fn serialize(&self) -> String {
        let now = unix_now();
        let records = self.lock_records();
        let live: Vec<CookieLine> = records
            .iter()
            .filter(|cookie| !cookie.is_expired_at(now))
            .cloned()
            .collect();
        encode_cookie_file(&live)
    }

    /// Drops every cookie.
    pub fn clear(&self) {
        *self.jar.write().unwrap_or_else(PoisonError::into_inner) = Jar::default();
        self.lock_records().clear();
    }

    /// Number of stored cookies, expired ones included until the next write.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_records().len()
    }

    /// Returns `true` when the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stored records.
    #[must_use]
    pub fn cookie_lines(&self) -> Vec<CookieLine> {
        self.lock_records().clone()
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<CookieLine>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, header: &str, url: &Url, now: u64) {
        let Some(parsed) = parse_set_cookie(header, url, now) else {
            debug!(url = %url, "ignoring unusable set-cookie header");
            return;
        };

        let mut records = self.lock_records();
        records.retain(|existing| !existing.same_slot(&parsed.cookie));
        if parsed.expired {
            debug!(name = %parsed.cookie.name, "cookie removed by server");
        } else {
            records.push(parsed.cookie);
        }
    }
}

impl CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<&HeaderValue> = cookie_headers.collect();
        let now = unix_now();

        for header in &headers {
            if let Ok(text) = header.to_str() {
                self.record(text, url, now);
            }
        }

        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .set_cookies(&mut headers.iter().copied(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies(url)
    }
}

struct ParsedSetCookie {
    cookie: CookieLine,
    expired: bool,
}

/// Reads the attributes needed for persistence from one `Set-Cookie` value.
///
/// Returns `None` for nameless cookies and for `Domain` attributes that do
/// not cover the request host.
fn parse_set_cookie(header: &str, url: &Url, now: u64) -> Option<ParsedSetCookie> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut domain_attr = None;
    let mut path_attr = None;
    let mut secure = false;
    let mut expires_attr = None;
    let mut max_age = None;

    for attribute in parts {
        let (key, val) = attribute
            .split_once('=')
            .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));
        match key.to_ascii_lowercase().as_str() {
            "domain" => domain_attr = Some(val.trim_start_matches('.').to_ascii_lowercase()),
            "path" => path_attr = Some(val.to_string()),
            "secure" => secure = true,
            "expires" => expires_attr = httpdate::parse_http_date(val).ok(),
            "max-age" => max_age = val.parse::<i64>().ok(),
            _ => {}
        }
    }

    let (domain, include_subdomains) = match domain_attr.filter(|d| !d.is_empty()) {
        Some(d) if host == d || host.ends_with(&format!(".{d}")) => (format!(".{d}"), true),
        Some(_) => return None,
        None => (host, false),
    };

    let path = path_attr
        .filter(|p| p.starts_with('/'))
        .unwrap_or_else(|| default_path(url));

    let (expires, expired) = match (max_age, expires_attr) {
        (Some(age), _) if age <= 0 => (0, true),
        (Some(age), _) => (now.saturating_add(age.unsigned_abs()), false),
        (None, Some(at)) => {
            let at = at
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs());
            (at, at <= now)
        }
        (None, None) => (0, false),
    };

    let mut cookie = CookieLine::new(domain, path, name, value.trim());
    cookie.include_subdomains = include_subdomains;
    cookie.secure = secure;
    cookie.expires = expires;
    Some(ParsedSetCookie { cookie, expired })
}

/// Directory of the request path, `/` at the top level.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
