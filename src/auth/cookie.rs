//! Cookie names and builders for session and handshake cookies.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the access token.
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Anti-CSRF nonce for one OAuth round-trip.
pub const STATE_COOKIE_NAME: &str = "oauth_state";

/// PKCE secret for one OAuth round-trip.
pub const VERIFIER_COOKIE_NAME: &str = "code_verifier";

/// Path to return to once the OAuth round-trip completes.
pub const REDIRECT_COOKIE_NAME: &str = "redirect_url";

/// One-shot login error notice.
pub const LOGIN_ERROR_COOKIE_NAME: &str = "login_error";

/// Handshake material lives for ten minutes at most.
pub const HANDSHAKE_TTL: Duration = Duration::minutes(10);

/// Build an `HttpOnly; SameSite=Lax; Path=/` cookie.
pub fn build_cookie(
    name: &'static str,
    value: impl Into<String>,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value.into()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Cookie used to match and delete `name` at `Path=/`.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}
