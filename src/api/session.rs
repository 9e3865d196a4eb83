//! Session API endpoints.
//!
//! - GET `/` - Resolve the session from the request cookies
//! - POST `/refresh` - Exchange the refresh token for a new token pair

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    middleware,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::auth::Session;
use crate::backend::SessionBackend;
use crate::oauth::IdentityProvider;
use crate::rate_limit::rate_limit_refresh;
use crate::state::AppState;

pub fn router<P, B>(state: AppState<P, B>) -> Router
where
    P: IdentityProvider,
    B: SessionBackend,
{
    let refresh_router = Router::new()
        .route("/refresh", post(refresh_session::<P, B>))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.limits.clone(),
            rate_limit_refresh,
        ));

    Router::new()
        .route("/", get(get_session::<P, B>))
        .with_state(state)
        .merge(refresh_router)
}

/// Current session as JSON. A stale access cookie is deleted on the way.
async fn get_session<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    jar: CookieJar,
) -> (CookieJar, Json<Session>) {
    let (jar, session) = state.auth.resolve(jar);
    (jar, Json(session))
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshResponse {
    success: bool,
    message: &'static str,
    data: Session,
}

/// Refresh the token pair.
///
/// The refresh token comes from the JSON body when one is sent, otherwise
/// from the refresh cookie. Both cookies are rewritten on success.
async fn refresh_session<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<RefreshResponse>), ApiError> {
    let from_body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|_| ApiError::bad_request("Invalid request body"))?
            .refresh_token
    };

    let store = state.auth.store();
    let refresh_token = from_body
        .or_else(|| store.read(&jar).refresh)
        .ok_or_else(|| ApiError::unauthorized("No refresh token"))?;

    let (jar, session) = state.renew_session(jar, &refresh_token).await?;
    tracing::debug!("Session refreshed");

    Ok((
        jar,
        Json(RefreshResponse {
            success: true,
            message: "Session refreshed",
            data: session,
        }),
    ))
}
