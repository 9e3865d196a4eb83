//! Application state shared by all route handlers.

use std::sync::Arc;

use axum_extra::extract::CookieJar;

use crate::auth::{AuthState, HasAuthState, Session, SessionStoreError};
use crate::backend::{ApiFailure, SessionBackend};
use crate::rate_limit::RateLimitConfig;

/// Explicit state container: nothing about the session lives in globals.
pub struct AppState<P, B> {
    pub auth: AuthState,
    pub provider: Arc<P>,
    pub backend: Arc<B>,
    pub limits: Arc<RateLimitConfig>,
}

// Manual Clone: avoid derive adding `P: Clone, B: Clone` bounds.
impl<P, B> Clone for AppState<P, B> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            provider: self.provider.clone(),
            backend: self.backend.clone(),
            limits: self.limits.clone(),
        }
    }
}

impl<P, B> HasAuthState for AppState<P, B> {
    fn auth(&self) -> &AuthState {
        &self.auth
    }
}

/// Why a server-side refresh did not produce a session.
#[derive(Debug, thiserror::Error)]
pub enum RenewError {
    #[error("backend refused the refresh: {0}")]
    Backend(#[from] ApiFailure),
    #[error("backend issued an unusable token pair: {0}")]
    Store(#[from] SessionStoreError),
}

impl<P, B: SessionBackend> AppState<P, B> {
    /// Trade a refresh token for a new pair, store it and resolve the result.
    pub async fn renew_session(
        &self,
        jar: CookieJar,
        refresh_token: &str,
    ) -> Result<(CookieJar, Session), RenewError> {
        let tokens = self.backend.refresh(refresh_token).await?;
        let jar = self
            .auth
            .store()
            .write(jar, &tokens.access_token, &tokens.refresh_token)?;
        Ok(self.auth.resolve(jar))
    }
}
