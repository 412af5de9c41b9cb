use crate::config::parse_bool_env;
use axum::http::{header, HeaderMap};
use std::{env, sync::OnceLock};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => SameSite::Lax,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

#[derive(Debug, Clone)]
struct CookieConfig {
    secure: bool,
    same_site: SameSite,
    domain: Option<String>,
}

impl CookieConfig {
    fn from_env() -> Self {
        let same_site = SameSite::parse(
            &env::var("AUTH_COOKIE_SAMESITE").unwrap_or_else(|_| "Lax".to_string()),
        );
        let domain = env::var("AUTH_COOKIE_DOMAIN")
            .ok()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Self {
            // browsers drop SameSite=None cookies that are not Secure
            secure: parse_bool_env("AUTH_COOKIE_SECURE", false) || same_site == SameSite::None,
            same_site,
            domain,
        }
    }

    /// Attributes shared by every auth cookie, after the `name=value` pair.
    fn attributes(&self) -> String {
        let mut attrs = format!("; Path=/; HttpOnly; SameSite={}", self.same_site.as_str());
        if self.secure {
            attrs.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            attrs.push_str("; Domain=");
            attrs.push_str(domain);
        }
        attrs
    }
}

fn cookie_config() -> &'static CookieConfig {
    static CONFIG: OnceLock<CookieConfig> = OnceLock::new();
    CONFIG.get_or_init(CookieConfig::from_env)
}

pub fn build_auth_cookie(name: &str, value: &str, max_age_seconds: u64) -> String {
    format!(
        "{name}={value}; Max-Age={max_age_seconds}{}",
        cookie_config().attributes()
    )
}

pub fn build_clear_cookie(name: &str) -> String {
    format!(
        "{name}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
        cookie_config().attributes()
    )
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookie_header| cookie_header.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name && !value.trim().is_empty()).then(|| value.trim().to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=abc.def; access_token=xyz"),
        );
        assert_eq!(
            extract_cookie(&headers, REFRESH_TOKEN_COOKIE).as_deref(),
            Some("abc.def")
        );
        assert_eq!(
            extract_cookie(&headers, ACCESS_TOKEN_COOKIE).as_deref(),
            Some("xyz")
        );
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn cleared_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        assert_eq!(extract_cookie(&headers, ACCESS_TOKEN_COOKIE), None);
    }

    #[test]
    fn auth_cookie_is_http_only() {
        let cookie = build_auth_cookie(REFRESH_TOKEN_COOKIE, "tok", 60);
        assert!(cookie.starts_with("refresh_token=tok; Max-Age=60"));
        assert!(cookie.contains("HttpOnly"));
        assert!(build_clear_cookie(REFRESH_TOKEN_COOKIE).contains("Max-Age=0"));
    }

    #[test]
    fn same_site_parsing() {
        assert_eq!(SameSite::parse("STRICT"), SameSite::Strict);
        assert_eq!(SameSite::parse("none"), SameSite::None);
        assert_eq!(SameSite::parse("bogus"), SameSite::Lax);
    }
}
