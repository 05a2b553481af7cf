//! Minimal cookie jar for the session manager.
//!
//! Handles `Domain`, `Path`, `Max-Age` and `Expires`; host-only cookies are
//! only sent back to the exact host that set them.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub host_only: bool,
    pub path: String,
    /// Unix seconds; `None` for session cookies
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl fmt::Debug for Cookie {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("host_only", &self.host_only)
            .field("path", &self.path)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Cookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    fn matches(&self, host: &str, path: &str) -> bool {
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(host, &self.domain)
        };
        domain_ok && path_matches(path, &self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|cookie| cookie.name == name)
    }

    /// Record one `Set-Cookie` header received from `url`.
    pub fn store(&mut self, url: &str, set_cookie: &str, now: i64) {
        let Ok(url) = Url::parse(url) else {
            return;
        };
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return;
        };

        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            tracing::debug!("Ignoring malformed Set-Cookie header");
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut domain = None;
        let mut path = None;
        let mut max_age = None;
        let mut expires = None;
        for attribute in parts {
            let (key, attribute_value) = attribute
                .split_once('=')
                .map_or((attribute.trim(), ""), |(key, value)| (key.trim(), unquote(value.trim())));
            match key.to_ascii_lowercase().as_str() {
                "domain" if !attribute_value.is_empty() => {
                    domain = Some(attribute_value.trim_start_matches('.').to_ascii_lowercase());
                }
                "path" if attribute_value.starts_with('/') => {
                    path = Some(attribute_value.to_string());
                }
                "max-age" => max_age = attribute_value.parse::<i64>().ok(),
                "expires" => expires = parse_cookie_date(attribute_value),
                _ => {}
            }
        }

        let (domain, host_only) = match domain {
            Some(domain) if domain_matches(&host, &domain) => (domain, false),
            Some(domain) => {
                tracing::debug!("Rejecting cookie {} for foreign domain {}", name, domain);
                return;
            }
            None => (host, true),
        };
        let path = path.unwrap_or_else(|| default_path(url.path()));
        // Max-Age takes precedence over Expires.
        let expires_at = max_age.map_or(expires, |seconds| Some(now.saturating_add(seconds)));

        self.cookies.retain(|existing| {
            !(existing.name == name && existing.domain == domain && existing.path == path)
        });

        let cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain,
            host_only,
            path,
            expires_at,
        };
        if !cookie.is_expired(now) {
            self.cookies.push(cookie);
        }
    }

    /// Value for a `Cookie` request header to `url`, if any cookie applies.
    pub fn header_for(&self, url: &str, now: i64) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|cookie| !cookie.is_expired(now) && cookie.matches(&host, url.path()))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    pub fn remove_expired(&mut self, now: i64) {
        self.cookies.retain(|cookie| !cookie.is_expired(now));
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || request_path.strip_prefix(cookie_path).is_some_and(|rest| {
            cookie_path.ends_with('/') || rest.starts_with('/')
        })
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => request_path[..index].to_string(),
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// `Expires` layouts still sent by servers besides RFC 1123. All are GMT.
const LEGACY_DATE_FORMATS: [&str; 4] = [
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a, %d-%b-%y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

fn parse_cookie_date(value: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.timestamp());
    }
    LEGACY_DATE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.and_utc().timestamp())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn host_only_cookie_is_sent_to_same_host() {
        let mut jar = CookieJar::new();
        jar.store("https://brew.example.com/login", "session=abc; Path=/; HttpOnly", NOW);

        assert_eq!(
            jar.header_for("https://brew.example.com/recipes", NOW),
            Some("session=abc".to_string())
        );
        assert_eq!(jar.header_for("https://auth.example.com/", NOW), None);
    }

    #[test]
    fn domain_cookie_covers_subdomains() {
        let mut jar = CookieJar::new();
        jar.store(
            "https://auth.example.com/customer/account/login/",
            "frontend=xyz; Domain=.example.com; Path=/",
            NOW,
        );

        assert_eq!(
            jar.header_for("https://brew.example.com/", NOW),
            Some("frontend=xyz".to_string())
        );
        assert_eq!(jar.header_for("https://example.org/", NOW), None);
    }

    #[test]
    fn foreign_domain_is_rejected() {
        let mut jar = CookieJar::new();
        jar.store("https://brew.example.com/", "evil=1; Domain=other.com", NOW);
        assert!(jar.is_empty());
    }

    #[test]
    fn max_age_zero_deletes_cookie() {
        let mut jar = CookieJar::new();
        jar.store("https://brew.example.com/", "session=abc; Path=/", NOW);
        jar.store("https://brew.example.com/", "session=; Path=/; Max-Age=0", NOW);
        assert!(jar.is_empty());
    }

    #[test]
    fn expires_in_the_past_is_dropped() {
        let mut jar = CookieJar::new();
        jar.store(
            "https://brew.example.com/",
            "old=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT",
            NOW,
        );
        jar.store(
            "https://brew.example.com/",
            "dashed=1; expires=Thu, 18-Oct-2040 10:00:00 GMT",
            NOW,
        );
        assert!(jar.get("old").is_none());
        assert!(jar.get("dashed").is_some_and(|cookie| cookie.expires_at.is_some()));
    }

    #[test]
    fn legacy_expires_formats_are_understood() {
        let expected = 2_234_167_200; // 2040-10-18 10:00:00 UTC
        assert_eq!(
            parse_cookie_date("Thursday, 18-Oct-40 10:00:00 GMT"),
            Some(expected)
        );
        assert_eq!(parse_cookie_date("Thu Oct 18 10:00:00 2040"), Some(expected));
        assert_eq!(parse_cookie_date("Thu, 18-Oct-2040 10:00:00 GMT"), Some(expected));
        assert_eq!(parse_cookie_date("next tuesday"), None);
    }

    #[test]
    fn quoted_attributes_are_unwrapped() {
        let mut jar = CookieJar::new();
        jar.store(
            "https://brew.example.com/recipes/1",
            r#"token="a b"; Path="/"; Max-Age="60""#,
            NOW,
        );
        let cookie = jar.get("token").unwrap();
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.expires_at, Some(NOW + 60));
        assert_eq!(cookie.value, r#""a b""#);
        assert_eq!(
            jar.header_for("https://brew.example.com/", NOW),
            Some(r#"token="a b""#.to_string())
        );
    }

    #[test]
    fn later_cookie_replaces_earlier_one() {
        let mut jar = CookieJar::new();
        jar.store("https://brew.example.com/", "session=one; Path=/", NOW);
        jar.store("https://brew.example.com/", "session=two; Path=/; Max-Age=60", NOW);
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("session").map(|c| c.value.as_str()), Some("two"));

        jar.remove_expired(NOW + 61);
        assert!(jar.is_empty());
    }

    #[test]
    fn path_scoping() {
        let mut jar = CookieJar::new();
        jar.store("https://brew.example.com/recipes/1", "scoped=1", NOW);
        assert!(jar.header_for("https://brew.example.com/recipes/2", NOW).is_some());
        assert!(jar.header_for("https://brew.example.com/recipesx", NOW).is_none());
        assert!(jar.header_for("https://brew.example.com/", NOW).is_none());
    }
}
