//! Handshake material for one OAuth round-trip.
//!
//! Three cookies carry it between the redirect to the provider and the
//! callback. They are read once at callback time and always deleted then.

use axum_extra::extract::CookieJar;

use super::pkce;
use crate::auth::cookie::{
    HANDSHAKE_TTL, REDIRECT_COOKIE_NAME, STATE_COOKIE_NAME, VERIFIER_COOKIE_NAME, build_cookie,
    removal_cookie,
};

/// Where a completed login lands when no usable `redirect_url` was given.
pub const DEFAULT_POST_LOGIN_PATH: &str = "/";

/// Freshly generated handshake material.
#[derive(Debug, Clone)]
pub struct HandshakeState {
    pub state: String,
    pub code_verifier: String,
    pub post_login_redirect: String,
}

impl HandshakeState {
    /// New random state and verifier. `redirect_url` is sanitised here.
    pub fn generate(redirect_url: Option<&str>) -> Self {
        Self {
            state: pkce::generate_state(),
            code_verifier: pkce::generate_code_verifier(),
            post_login_redirect: sanitize_redirect_path(redirect_url),
        }
    }

    pub fn code_challenge(&self) -> String {
        pkce::code_challenge(&self.code_verifier)
    }

    /// Persist as three independent short-lived cookies.
    pub fn store(&self, jar: CookieJar, secure: bool) -> CookieJar {
        jar.add(build_cookie(
            STATE_COOKIE_NAME,
            self.state.clone(),
            HANDSHAKE_TTL,
            secure,
        ))
        .add(build_cookie(
            VERIFIER_COOKIE_NAME,
            self.code_verifier.clone(),
            HANDSHAKE_TTL,
            secure,
        ))
        .add(build_cookie(
            REDIRECT_COOKIE_NAME,
            self.post_login_redirect.clone(),
            HANDSHAKE_TTL,
            secure,
        ))
    }
}

/// Whatever handshake cookies the callback request carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnedHandshake {
    pub state: Option<String>,
    pub code_verifier: Option<String>,
    pub post_login_redirect: String,
}

/// Read the handshake cookies and delete them in the returned jar.
pub fn take(jar: CookieJar) -> (CookieJar, ReturnedHandshake) {
    let value = |name| jar.get(name).map(|c| c.value().to_owned());
    let returned = ReturnedHandshake {
        state: value(STATE_COOKIE_NAME),
        code_verifier: value(VERIFIER_COOKIE_NAME),
        post_login_redirect: sanitize_redirect_path(value(REDIRECT_COOKIE_NAME).as_deref()),
    };

    let jar = jar
        .remove(removal_cookie(STATE_COOKIE_NAME))
        .remove(removal_cookie(VERIFIER_COOKIE_NAME))
        .remove(removal_cookie(REDIRECT_COOKIE_NAME));

    (jar, returned)
}

/// Keep `path` only if it is a path on this origin.
pub fn sanitize_redirect_path(path: Option<&str>) -> String {
    match path {
        Some(p)
            if p.starts_with('/')
                && !p.starts_with("//")
                && !p
                    .chars()
                    .any(|c| c.is_control() || c.is_whitespace() || "\\;,\"".contains(c)) =>
        {
            p.to_string()
        }
        _ => DEFAULT_POST_LOGIN_PATH.to_string(),
    }
}
