//! Session cookies and the cookie domain derived from `CLIENT_URL`.

use std::net::IpAddr;

use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use reqwest::Url;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookiePolicy {
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookiePolicy {
    /// https client: share cookies across `.<parent domain>` and mark them
    /// Secure. Anything else: host-only, not Secure.
    pub fn from_client_url(client_url: Option<&str>) -> Self {
        let Some(url) = client_url.and_then(|raw| Url::parse(raw).ok()) else {
            return Self::default();
        };

        if url.scheme() != "https" {
            return Self::default();
        }

        Self {
            domain: url.host_str().and_then(parent_domain).map(|d| format!(".{d}")),
            secure: true,
        }
    }

    fn build(&self, name: &'static str, value: String, max_age: time::Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }

    pub fn access_cookie(&self, token: &str, ttl_secs: i64) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, token.to_string(), time::Duration::seconds(ttl_secs))
    }

    pub fn refresh_cookie(&self, token: &str, ttl_secs: i64) -> Cookie<'static> {
        self.build(REFRESH_COOKIE, token.to_string(), time::Duration::seconds(ttl_secs))
    }

    /// Both cookies expired immediately, with the attributes they were set with.
    pub fn clear_session(&self) -> CookieJar {
        CookieJar::new()
            .add(self.build(ACCESS_COOKIE, String::new(), time::Duration::ZERO))
            .add(self.build(REFRESH_COOKIE, String::new(), time::Duration::ZERO))
    }
}

/// Last two labels of a DNS host name; `None` for IPs and single labels.
fn parent_domain(host: &str) -> Option<String> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }

    Some(labels[labels.len() - 2..].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_client_shares_parent_domain() {
        let policy = CookiePolicy::from_client_url(Some("https://app.openbrief.io/dashboard"));
        assert_eq!(policy.domain.as_deref(), Some(".openbrief.io"));
        assert!(policy.secure);

        let policy = CookiePolicy::from_client_url(Some("https://openbrief.io"));
        assert_eq!(policy.domain.as_deref(), Some(".openbrief.io"));
    }

    #[test]
    fn plain_http_client_is_host_only() {
        let policy = CookiePolicy::from_client_url(Some("http://localhost:3000"));
        assert_eq!(policy, CookiePolicy::default());
    }

    #[test]
    fn missing_or_odd_client_urls() {
        assert_eq!(CookiePolicy::from_client_url(None), CookiePolicy::default());
        assert_eq!(CookiePolicy::from_client_url(Some("not a url")), CookiePolicy::default());

        let single = CookiePolicy::from_client_url(Some("https://localhost"));
        assert!(single.secure);
        assert!(single.domain.is_none());

        let ip = CookiePolicy::from_client_url(Some("https://10.0.0.7"));
        assert!(ip.domain.is_none());
    }

    #[test]
    fn session_cookie_attributes() {
        let policy = CookiePolicy {
            domain: Some(".openbrief.io".into()),
            secure: true,
        };
        let cookie = policy.access_cookie("jwt", 3600).to_string();

        assert!(cookie.starts_with("accessToken=jwt"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Domain=openbrief.io") || cookie.contains("Domain=.openbrief.io"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn clearing_expires_both_cookies() {
        let jar = CookiePolicy::default().clear_session();
        let access = jar.get(ACCESS_COOKIE).unwrap();
        let refresh = jar.get(REFRESH_COOKIE).unwrap();
        assert_eq!(access.value(), "");
        assert_eq!(access.max_age(), Some(time::Duration::ZERO));
        assert_eq!(refresh.max_age(), Some(time::Duration::ZERO));
    }
}
