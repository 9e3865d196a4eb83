//! Authentication state shared by extractors, middleware and handlers.

use std::sync::Arc;

use axum_extra::extract::CookieJar;

use super::session::{Session, resolve};
use super::store::SessionStore;
use crate::jwt::TokenCodec;

/// Token codec plus cookie policy.
#[derive(Clone, Debug)]
pub struct AuthState {
    pub codec: Arc<TokenCodec>,
    /// Whether to set the Secure flag on cookies (production)
    pub secure_cookies: bool,
}

impl AuthState {
    pub fn new(codec: TokenCodec, secure_cookies: bool) -> Self {
        Self {
            codec: Arc::new(codec),
            secure_cookies,
        }
    }

    pub fn store(&self) -> SessionStore<'_> {
        SessionStore::new(&self.codec, self.secure_cookies)
    }

    pub fn resolve(&self, jar: CookieJar) -> (CookieJar, Session) {
        resolve(&self.codec, self.secure_cookies, jar)
    }
}

/// Trait for state types that carry an [`AuthState`].
pub trait HasAuthState {
    fn auth(&self) -> &AuthState;
}

impl HasAuthState for AuthState {
    fn auth(&self) -> &AuthState {
        self
    }
}
