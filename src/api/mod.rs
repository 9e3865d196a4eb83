mod error;
mod session;

use axum::Router;

use crate::backend::SessionBackend;
use crate::oauth::IdentityProvider;
use crate::state::AppState;

pub use error::ApiError;

/// Create the API router.
pub fn create_api_router<P, B>(state: AppState<P, B>) -> Router
where
    P: IdentityProvider,
    B: SessionBackend,
{
    Router::new()
        .nest("/session", session::router(state))
        .fallback(|| async { ApiError::not_found("No such endpoint") })
}
