//! Cookie construction and parsing.
//!
//! Session and CSRF state are carried in HTTP-only cookies built by hand
//! as `Set-Cookie` strings. The `Secure` attribute follows the deployment
//! URL scheme — HTTPS deployments get `Secure` cookies, local HTTP
//! development does not.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "shipgate_session";
/// Name of the short-lived OAuth CSRF state cookie.
pub const OAUTH_STATE_COOKIE: &str = "shipgate_oauth_state";

/// Lifetime of the OAuth state cookie: long enough for the provider
/// round-trip, short enough to bound replay.
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Build a `Set-Cookie` value for an HTTP-only cookie.
#[must_use]
pub fn build(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build a `Set-Cookie` value that deletes the named cookie.
#[must_use]
pub fn clear(name: &str, secure: bool) -> String {
    build(name, "", 0, secure)
}

/// Extract a cookie value from the request headers.
///
/// Handles multiple `Cookie` headers and the `; `-joined form.
#[must_use]
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        // A non-UTF-8 header must not mask a valid cookie in a later one.
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            let pair = pair.trim();
            if let Some((k, v)) = pair.split_once('=') {
                if k == name {
                    return Some(v.to_owned());
                }
            }
        }
    }
    None
}
