use axum::{
    Router,
    extract::{Path, Query, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use url::form_urlencoded;

use super::errors::HandshakeError;
use super::handshake::{self, DEFAULT_POST_LOGIN_PATH, HandshakeState, ReturnedHandshake};
use super::provider::IdentityProvider;
use crate::auth::LOGIN_PATH;
use crate::backend::{LoginRequest, SessionBackend};
use crate::rate_limit::rate_limit_callback;
use crate::state::AppState;

/// `GET /login/{provider}` and `GET /login/{provider}/callback`.
pub fn router<P, B>(state: AppState<P, B>) -> Router
where
    P: IdentityProvider,
    B: SessionBackend,
{
    let callback = get(callback::<P, B>).layer(middleware::from_fn_with_state(
        state.limits.clone(),
        rate_limit_callback,
    ));

    Router::new()
        .route("/login/{provider}", get(initiate::<P, B>))
        .route("/login/{provider}/callback", callback)
        .with_state(state)
}

// ── Initiate ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct InitiateParams {
    redirect_url: Option<String>,
}

async fn initiate<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    Path(provider): Path<String>,
    Query(params): Query<InitiateParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), HandshakeError> {
    if provider != state.provider.name() {
        return Err(HandshakeError::UnknownProvider);
    }

    let handshake = HandshakeState::generate(params.redirect_url.as_deref());
    let url = state
        .provider
        .authorization_url(&handshake.state, &handshake.code_challenge());
    let jar = handshake.store(jar, state.auth.secure_cookies);

    tracing::info!(provider = %provider, "OAuth login initiated");

    Ok((jar, Redirect::to(url.as_str())))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// How a callback ends, before the cookie jar is attached.
enum CallbackOutcome {
    LoggedIn { redirect_to: String },
    Rejected(HandshakeError),
    /// Back to the login page with an error code, keeping the destination.
    BackToLogin { error: String, return_to: String },
}

async fn callback<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Response {
    // Handshake cookies are removed on every path out of here.
    let (jar, returned) = handshake::take(jar);

    let (jar, outcome) = complete_login(&state, &provider, params, returned, jar).await;
    match outcome {
        CallbackOutcome::LoggedIn { redirect_to } => {
            (jar, Redirect::to(&redirect_to)).into_response()
        }
        CallbackOutcome::Rejected(err) => {
            tracing::warn!(provider = %provider, reason = %err, "OAuth callback rejected");
            (jar, err).into_response()
        }
        CallbackOutcome::BackToLogin { error, return_to } => {
            (jar, login_error(&error, &return_to)).into_response()
        }
    }
}

async fn complete_login<P: IdentityProvider, B: SessionBackend>(
    state: &AppState<P, B>,
    provider: &str,
    params: CallbackParams,
    returned: ReturnedHandshake,
    jar: CookieJar,
) -> (CookieJar, CallbackOutcome) {
    if provider != state.provider.name() {
        return (jar, CallbackOutcome::Rejected(HandshakeError::UnknownProvider));
    }

    let ReturnedHandshake {
        state: stored_state,
        code_verifier,
        post_login_redirect,
    } = returned;
    let back_to_login = |error: &str| CallbackOutcome::BackToLogin {
        error: error.to_string(),
        return_to: post_login_redirect.clone(),
    };

    let (Some(received_state), Some(stored_state)) = (params.state, stored_state) else {
        return (
            jar,
            CallbackOutcome::Rejected(HandshakeError::MissingParameters),
        );
    };

    // Provider errors are only honoured for the handshake we started.
    if received_state != stored_state {
        return (jar, CallbackOutcome::Rejected(HandshakeError::StateMismatch));
    }

    if let Some(error) = params.error {
        tracing::warn!(provider = %provider, error = %error, "Provider returned an error");
        return (jar, back_to_login(&error));
    }

    let (Some(code), Some(code_verifier)) = (params.code, code_verifier) else {
        return (
            jar,
            CallbackOutcome::Rejected(HandshakeError::MissingParameters),
        );
    };

    let identity = match state.provider.exchange_code(&code, &code_verifier).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "Token exchange failed");
            return (jar, CallbackOutcome::Rejected(HandshakeError::ExchangeFailed));
        }
    };

    let tokens = match state
        .backend
        .login(&LoginRequest::from_identity(provider, &identity))
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "Backend login failed");
            return (jar, back_to_login("login_failed"));
        }
    };

    match state
        .auth
        .store()
        .write(jar.clone(), &tokens.access_token, &tokens.refresh_token)
    {
        Ok(jar) => {
            tracing::info!(provider = %provider, "Session established");
            (
                jar,
                CallbackOutcome::LoggedIn {
                    redirect_to: post_login_redirect,
                },
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Backend issued tokens that do not verify");
            (jar, back_to_login("session_failed"))
        }
    }
}

fn login_error(code: &str, return_to: &str) -> Redirect {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("error", code);
    if return_to != DEFAULT_POST_LOGIN_PATH {
        query.append_pair("redirect_url", return_to);
    }
    Redirect::to(&format!("{LOGIN_PATH}?{}", query.finish()))
}
