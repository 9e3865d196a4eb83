//! Session Store: the access/refresh cookie pair over a request's cookie jar.

use axum_extra::extract::CookieJar;
use time::Duration;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, build_cookie, removal_cookie};
use super::errors::SessionStoreError;
use crate::jwt::{TokenClaims, TokenCodec, TokenType, unix_now};

/// Raw cookie values, unverified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredTokens {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Reads and writes the two session cookies.
#[derive(Clone, Copy)]
pub struct SessionStore<'a> {
    codec: &'a TokenCodec,
    secure: bool,
}

impl<'a> SessionStore<'a> {
    pub fn new(codec: &'a TokenCodec, secure: bool) -> Self {
        Self { codec, secure }
    }

    /// Persist both tokens. Each cookie expires together with its token.
    ///
    /// Nothing is written unless both tokens verify.
    pub fn write(
        &self,
        jar: CookieJar,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<CookieJar, SessionStoreError> {
        let access = self
            .codec
            .verify_access(access_token)
            .map_err(|reason| SessionStoreError::InvalidTokenPair {
                token_type: TokenType::Access,
                reason,
            })?;
        let refresh = self
            .codec
            .verify_refresh(refresh_token)
            .map_err(|reason| SessionStoreError::InvalidTokenPair {
                token_type: TokenType::Refresh,
                reason,
            })?;

        let now = unix_now();
        Ok(jar
            .add(build_cookie(
                ACCESS_COOKIE_NAME,
                access_token,
                remaining(&access, now),
                self.secure,
            ))
            .add(build_cookie(
                REFRESH_COOKIE_NAME,
                refresh_token,
                remaining(&refresh, now),
                self.secure,
            )))
    }

    /// Raw cookie values. No verification happens here.
    pub fn read(&self, jar: &CookieJar) -> StoredTokens {
        StoredTokens {
            access: jar.get(ACCESS_COOKIE_NAME).map(|c| c.value().to_owned()),
            refresh: jar.get(REFRESH_COOKIE_NAME).map(|c| c.value().to_owned()),
        }
    }

    /// Delete the access cookie only.
    pub fn clear_access(&self, jar: CookieJar) -> CookieJar {
        jar.remove(removal_cookie(ACCESS_COOKIE_NAME))
    }

    /// Delete both cookies. Safe to call when they are already gone.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(removal_cookie(ACCESS_COOKIE_NAME))
            .remove(removal_cookie(REFRESH_COOKIE_NAME))
    }
}

fn remaining(claims: &TokenClaims, now: u64) -> Duration {
    let secs = claims.exp.saturating_sub(now);
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}
