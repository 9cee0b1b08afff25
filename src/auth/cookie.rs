use axum::http::{header, HeaderMap};

use crate::config::Mode;

/// Builds the `Set-Cookie` values for the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub mode: Mode,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
        }
    }

    fn attributes(&self) -> &'static str {
        if self.mode.is_production() {
            // Cross-site frontend needs SameSite=None, which browsers only accept with Secure
            "HttpOnly; Secure; SameSite=None; Path=/"
        } else {
            "HttpOnly; SameSite=Lax; Path=/"
        }
    }

    pub fn set(&self, token: &str, max_age_secs: i64) -> String {
        format!(
            "{}={}; {}; Max-Age={}",
            self.name,
            token,
            self.attributes(),
            max_age_secs.max(0)
        )
    }

    pub fn clear(&self) -> String {
        format!(
            "{}=; {}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.name,
            self.attributes()
        )
    }
}

pub fn get_cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

pub fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Session token from the cookie first, then the bearer header.
pub fn extract_session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    get_cookie_value(headers, cookie_name).or_else(|| get_bearer_token(headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn development_cookie_is_lax_and_not_secure() {
        let cookie = SessionCookie::new("token", Mode::Development).set("abc", 60);
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));
        assert!(cookie.ends_with("Max-Age=60"));
    }

    #[test]
    fn production_cookie_is_secure_and_cross_site() {
        let cookie = SessionCookie::new("token", Mode::Production).set("abc", 60);
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
    }

    #[test]
    fn clear_expires_immediately() {
        let cookie = SessionCookie::new("token", Mode::Development).clear();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=from-cookie"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(
            extract_session_token(&headers, "token"),
            Some("from-cookie")
        );
    }

    #[test]
    fn bearer_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(
            extract_session_token(&headers, "token"),
            Some("from-header")
        );
    }

    #[test]
    fn no_token_anywhere() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_session_token(&headers, "token"), None);
    }
}
