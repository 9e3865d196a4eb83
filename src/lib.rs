pub mod api;
pub mod auth;
pub mod backend;
pub mod cli;
pub mod csp;
pub mod error;
pub mod jwt;
pub mod oauth;
pub mod pages;
pub mod rate_limit;
pub mod scheduler;
pub mod state;

use api::create_api_router;
use auth::{AuthState, route_guard};
use axum::{Router, middleware};
use backend::{BackendClient, SessionBackend};
use error::ConfigurationError;
use jwt::TokenCodec;
use oauth::{IdentityProvider, OAuthConfig, OAuthProvider};
use rate_limit::RateLimitConfig;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

pub struct ServerConfig {
    /// HS256 secret shared with the backend that mints the tokens
    pub session_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Base URL of the backend API
    pub backend_url: Url,
    /// Identity provider client settings
    pub oauth: OAuthConfig,
}

/// Build the application from configuration, wiring in the real provider
/// and backend clients.
pub fn build_app(config: &ServerConfig) -> Result<Router, ConfigurationError> {
    let auth = AuthState::new(
        TokenCodec::new(&config.session_secret)?,
        config.secure_cookies,
    );
    let provider = OAuthProvider::new(config.oauth.clone())?;
    let backend = BackendClient::new(config.backend_url.clone())?;
    Ok(create_app(auth, provider, backend))
}

/// Create the application router around any provider and backend.
///
/// Must be called from within a Tokio runtime: the rate limiter cleanup task
/// is spawned here.
pub fn create_app<P, B>(auth: AuthState, provider: P, backend: B) -> Router
where
    P: IdentityProvider,
    B: SessionBackend,
{
    let limits = Arc::new(RateLimitConfig::new());
    rate_limit::spawn_limiter_cleanup(limits.clone(), rate_limit::LIMITER_CLEANUP_INTERVAL);

    let state = AppState {
        auth: auth.clone(),
        provider: Arc::new(provider),
        backend: Arc::new(backend),
        limits,
    };

    Router::new()
        .nest("/api", create_api_router(state.clone()))
        .merge(oauth::router(state.clone()))
        .merge(pages::router(state))
        .layer(middleware::from_fn_with_state(auth, route_guard))
        .layer(middleware::from_fn(csp::csp_middleware))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), std::io::Error> {
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
