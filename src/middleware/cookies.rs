//! Minimal cookie reading and `Set-Cookie` construction.

use axum::http::{HeaderMap, header::COOKIE};

use crate::config::Config;
use crate::models::user::AuthSession;

/// Refresh tokens outlive the browser session.
const REFRESH_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Value of cookie `name`, searching every `Cookie` header.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Build a `Set-Cookie` header value.
///
/// Cookies are `HttpOnly`, `SameSite=Lax` and scoped to `/`. `max_age` of
/// `Some(0)` deletes the cookie; `None` makes it a browser-session cookie.
pub fn build(name: &str, value: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={age}"));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Cookies carrying a freshly issued auth session.
pub fn session(config: &Config, session: &AuthSession) -> [String; 2] {
    let secure = config.secure_cookies();
    [
        build(&config.session_cookie, &session.access_token, None, secure),
        build(
            &config.refresh_cookie(),
            &session.refresh_token,
            Some(REFRESH_MAX_AGE_SECS),
            secure,
        ),
    ]
}

/// Cookies that remove the auth session from the browser.
pub fn clear_session(config: &Config) -> [String; 2] {
    let secure = config.secure_cookies();
    [
        build(&config.session_cookie, "", Some(0), secure),
        build(&config.refresh_cookie(), "", Some(0), secure),
    ]
}
