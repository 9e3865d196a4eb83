//! Session Resolver.
//!
//! Produces a fresh [`Session`] from the request's cookies on every call. There
//! is no server-side session table: the cookies are the session.
//!
//! A missing or invalid access token is not an error. It yields the
//! unauthenticated shape, with the raw refresh token preserved so callers can
//! tell "never logged in" from "access lapsed, refresh still possible".

use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use super::store::SessionStore;
use crate::jwt::{TokenClaims, TokenCodec, UserId};

/// Identity fields exposed to pages and to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<String>,
}

impl UserSummary {
    /// "First Last", falling back to the email.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }
}

impl From<TokenClaims> for UserSummary {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            first_name: claims.first_name,
            last_name: claims.last_name,
            avatar_url: claims.avatar_url,
            created_at: claims.created_at,
        }
    }
}

/// The authenticated identity view for one request.
///
/// `is_authenticated` holds exactly when `user` is set, which holds exactly
/// when `access_token` was present and verified at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_authenticated: bool,
    pub user: Option<UserSummary>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn unauthenticated(refresh_token: Option<String>) -> Self {
        Self {
            is_authenticated: false,
            user: None,
            access_token: None,
            refresh_token,
        }
    }

    pub fn authenticated(
        claims: TokenClaims,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            is_authenticated: true,
            user: Some(claims.into()),
            access_token: Some(access_token),
            refresh_token,
        }
    }

    /// True when the holder has any chance of being logged in.
    pub fn has_credentials(&self) -> bool {
        self.is_authenticated || self.refresh_token.is_some()
    }
}

/// Resolve the session carried by `jar`.
///
/// A present but unverifiable access cookie is deleted in the returned jar.
pub fn resolve(codec: &TokenCodec, secure: bool, jar: CookieJar) -> (CookieJar, Session) {
    let store = SessionStore::new(codec, secure);
    let tokens = store.read(&jar);

    let Some(access_token) = tokens.access else {
        return (jar, Session::unauthenticated(tokens.refresh));
    };

    match codec.verify_access(&access_token) {
        Ok(claims) => (
            jar,
            Session::authenticated(claims, access_token, tokens.refresh),
        ),
        Err(reason) => {
            tracing::debug!(reason = %reason, "Clearing unverifiable access cookie");
            (
                store.clear_access(jar),
                Session::unauthenticated(tokens.refresh),
            )
        }
    }
}
