//! Line format of the persisted cookie jar.
//!
//! A header line followed by one cookie per line, seven TAB-separated fields
//! in Netscape order: domain, subdomain flag, path, secure flag, expiry,
//! name, value. Only blobs produced by [`encode_cookie_file`] are read back,
//! so decoding is strict.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use url::Url;

pub(crate) const JAR_HEADER: &str = "# Netscape HTTP Cookie File";

/// One persisted cookie. The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieLine {
    /// Host, with a leading dot when subdomains match.
    pub domain: String,
    /// Sent to subdomains of `domain` as well.
    pub include_subdomains: bool,
    /// Path scope.
    pub path: String,
    /// Sent over https only.
    pub secure: bool,
    /// Unix seconds; 0 for a session cookie.
    pub expires: u64,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl CookieLine {
    /// Host-only, non-secure session cookie; adjust the public fields as needed.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            include_subdomains: false,
            path: path.into(),
            secure: false,
            expires: 0,
            name: name.into(),
            value: value.into(),
        }
    }

    /// The cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `true` when the cookie carries an expiry at or before `now` (Unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires != 0 && self.expires <= now
    }

    /// Same identity as `other`: domain, path and name.
    #[must_use]
    pub fn same_slot(&self, other: &CookieLine) -> bool {
        self.domain.eq_ignore_ascii_case(&other.domain)
            && self.path == other.path
            && self.name == other.name
    }

    /// URL the cookie is re-inserted against when a jar is restored.
    pub(crate) fn replay_origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        Url::parse(&format!("{scheme}://{host}{}", self.path)).ok()
    }

    /// `Set-Cookie` value that recreates this cookie in a `reqwest` jar.
    pub(crate) fn replay_header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.include_subdomains {
            header.push_str("; Domain=");
            header.push_str(&self.domain);
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if let Some(expiry) = self.expiry() {
            header.push_str("; Expires=");
            header.push_str(&httpdate::fmt_http_date(expiry));
        }
        header
    }

    fn expiry(&self) -> Option<SystemTime> {
        if self.expires == 0 {
            return None;
        }
        UNIX_EPOCH.checked_add(Duration::from_secs(self.expires))
    }

    fn encode(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.domain,
            flag_field(self.include_subdomains),
            self.path,
            flag_field(self.secure),
            self.expires,
            self.name,
            self.value,
        )
    }

    fn decode(line: &str) -> Result<Self, &'static str> {
        let mut fields = line.splitn(7, '\t');
        let mut field = || fields.next().ok_or("expected 7 TAB-separated fields");

        let domain = field()?;
        let include_subdomains = parse_flag(field()?)?;
        let path = field()?;
        let secure = parse_flag(field()?)?;
        let expires = field()?
            .parse::<u64>()
            .map_err(|_| "expiry is not a Unix timestamp")?;
        let name = field()?;
        let value = field()?;

        if domain.is_empty() || name.is_empty() {
            return Err("empty domain or name");
        }

        let mut cookie = Self::new(domain, path, name, value);
        cookie.include_subdomains = include_subdomains;
        cookie.secure = secure;
        cookie.expires = expires;
        Ok(cookie)
    }
}

impl fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("expires", &self.expires)
            .field("value", &format_args!("<{} bytes>", self.value.len()))
            .finish_non_exhaustive()
    }
}

/// Errors decoding a persisted jar.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// The blob was not written by this crate.
    #[error("cookie jar blob does not start with the jar header")]
    MissingHeader,

    /// A cookie line could not be decoded.
    #[error("cookie jar line {line}: {reason}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong; never includes the cookie value.
        reason: &'static str,
    },
}

/// Encodes `cookies` below the jar header.
pub(crate) fn encode_cookie_file(cookies: &[CookieLine]) -> String {
    let mut out = String::from(JAR_HEADER);
    out.push('\n');
    for cookie in cookies {
        out.push_str(&cookie.encode());
        out.push('\n');
    }
    out
}

/// Decodes a blob produced by [`encode_cookie_file`]. Blank lines are ignored.
pub(crate) fn decode_cookie_file(blob: &str) -> Result<Vec<CookieLine>, CookieError> {
    let mut lines = blob
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    match lines.next() {
        Some((_, first)) if first.trim_end() == JAR_HEADER => {}
        _ => return Err(CookieError::MissingHeader),
    }

    lines
        .map(|(idx, line)| {
            CookieLine::decode(line).map_err(|reason| CookieError::Malformed {
                line: idx + 1,
                reason,
            })
        })
        .collect()
}

fn flag_field(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

fn parse_flag(field: &str) -> Result<bool, &'static str> {
    match field {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err("flag is neither TRUE nor FALSE"),
    }
}
