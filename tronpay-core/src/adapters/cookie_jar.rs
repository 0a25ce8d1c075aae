//! File-backed cookie jar for the refresh session
//!
//! The backend hands out its refresh session as a cookie at login and wants
//! it back on `/auth/reissue`. Every `tp` command is a new process, so the
//! jar is persisted in `cookies.json` next to `credentials.json`:
//! ```json
//! { "cookies": [ { "host": "api.example.com", "name": "session", "value": "...", "path": "/" } ] }
//! ```
//! Cookies are host-only; `Domain` attributes are ignored. Session cookies
//! (no `Expires`/`Max-Age`) are kept until the server replaces or expires them.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::locked_file::{read_shared, write_exclusive};
use crate::domain::result::Result;

pub const COOKIES_FILE: &str = "cookies.json";

/// Upper bound on `Max-Age`, 400 days
const MAX_AGE_CAP_SECS: i64 = 400 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCookie {
    host: String,
    name: String,
    value: String,
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.host == other.host && self.name == other.name && self.path == other.path
    }

    fn matches(&self, url: &Url, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) || (self.secure && url.scheme() != "https") {
            return false;
        }
        if url.host_str() != Some(self.host.as_str()) {
            return false;
        }
        let request_path = url.path();
        request_path == self.path
            || (request_path.starts_with(&self.path)
                && (self.path.ends_with('/')
                    || request_path[self.path.len()..].starts_with('/')))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CookiesFile {
    #[serde(default)]
    cookies: Vec<StoredCookie>,
}

/// Parse one `Set-Cookie` header received from `url`
fn parse_set_cookie(header: &str, url: &Url, now: DateTime<Utc>) -> Option<StoredCookie> {
    let host = url.host_str()?;
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = StoredCookie {
        host: host.to_string(),
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        path: "/".to_string(),
        secure: false,
        expires_at: None,
    };
    let mut max_age = None;

    for attribute in parts {
        let (key, val) = match attribute.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attribute.trim(), ""),
        };
        if key.eq_ignore_ascii_case("path") && val.starts_with('/') {
            cookie.path = val.to_string();
        } else if key.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if key.eq_ignore_ascii_case("max-age") {
            max_age = val.parse::<i64>().ok();
        } else if key.eq_ignore_ascii_case("expires") {
            if let Ok(at) = DateTime::parse_from_rfc2822(val) {
                cookie.expires_at = Some(at.with_timezone(&Utc));
            }
        }
    }

    // Max-Age wins over Expires
    if let Some(seconds) = max_age {
        cookie.expires_at = Some(if seconds <= 0 {
            now
        } else {
            now + Duration::seconds(seconds.min(MAX_AGE_CAP_SECS))
        });
    }
    Some(cookie)
}

/// Cookie jar persisted to the data directory
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    cookies: RwLock<Vec<StoredCookie>>,
}

impl FileCookieJar {
    /// Open the jar in `dir`. A missing or corrupt file means an empty jar.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(COOKIES_FILE);
        let now = Utc::now();
        let cookies = read_shared(&path)?
            .map(|content| serde_json::from_str::<CookiesFile>(&content).unwrap_or_default())
            .unwrap_or_default()
            .cookies
            .into_iter()
            .filter(|c| !c.is_expired(now))
            .collect();

        Ok(Self {
            path,
            cookies: RwLock::new(cookies),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live cookies held
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| !c.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cookie, on disk too
    pub fn clear(&self) -> Result<()> {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        if self.path.exists() {
            self.save(&[])?;
        }
        Ok(())
    }

    fn save(&self, cookies: &[StoredCookie]) -> Result<()> {
        let file = CookiesFile {
            cookies: cookies.to_vec(),
        };
        write_exclusive(&self.path, &serde_json::to_string_pretty(&file)?)
    }
}

impl reqwest::cookie::CookieStore for FileCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let now = Utc::now();
        let received: Vec<StoredCookie> = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|header| parse_set_cookie(header, url, now))
            .collect();
        if received.is_empty() {
            return;
        }

        let mut cookies = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        for cookie in received {
            cookies.retain(|existing| !existing.same_slot(&cookie));
            if !cookie.is_expired(now) {
                cookies.push(cookie);
            }
        }
        cookies.retain(|c| !c.is_expired(now));

        // The trait has no error channel; a failed write leaves the jar valid in memory
        let _ = self.save(&cookies);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let now = Utc::now();
        let cookies = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        let header = cookies
            .iter()
            .filter(|c| c.matches(url, now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}
