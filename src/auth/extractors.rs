//! Axum extractors for the current session.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use super::session::Session;
use super::state::HasAuthState;

/// The session for this request. Never rejects.
///
/// Behind the route guard the already-resolved session is reused from the
/// request extensions; elsewhere it is resolved from the cookies. Cookie
/// cleanup side effects are the guard's job, so none are emitted here.
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(CurrentSession(session.clone()));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let (_, session) = state.auth().resolve(jar);
        Ok(CurrentSession(session))
    }
}
