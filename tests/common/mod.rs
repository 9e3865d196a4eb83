#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, Response};
use jsonwebtoken::{EncodingKey, Header};
use tallyroom::auth::AuthState;
use tallyroom::backend::{
    ApiFailure, ApiFailureKind, ApiResult, LoginRequest, SessionBackend, TokenPair,
};
use tallyroom::create_app;
use tallyroom::jwt::{TokenClaims, TokenCodec, TokenType, UserId};
use tallyroom::oauth::{IdentityProvider, ProviderError, ProviderIdentity};
use url::Url;

pub const SECRET: &[u8] = b"integration-test-session-secret!";

pub const PROVIDER: &str = "google";

// =============================================================================
// Tokens
// =============================================================================

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn claims(token_type: TokenType, iat: u64, exp: u64) -> TokenClaims {
    TokenClaims {
        id: UserId("1001".into()),
        email: "grace@example.edu".into(),
        first_name: Some("Grace".into()),
        last_name: Some("Hopper".into()),
        avatar_url: None,
        created_at: None,
        token_type,
        iat,
        exp,
    }
}

pub fn mint_with(secret: &[u8], claims: &TokenClaims) -> String {
    jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// Token of `token_type` valid for `ttl` more seconds.
pub fn mint(token_type: TokenType, ttl: u64) -> String {
    let now = now();
    mint_with(SECRET, &claims(token_type, now, now + ttl))
}

pub fn mint_expired(token_type: TokenType) -> String {
    let now = now();
    mint_with(SECRET, &claims(token_type, now - 600, now - 60))
}

pub fn token_pair() -> TokenPair {
    TokenPair {
        access_token: mint(TokenType::Access, 900),
        refresh_token: mint(TokenType::Refresh, 7 * 24 * 3600),
    }
}

// =============================================================================
// Fake identity provider
// =============================================================================

#[derive(Clone, Default)]
pub struct FakeProvider {
    pub exchanges: Arc<AtomicUsize>,
    pub reject_codes: bool,
}

impl FakeProvider {
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for FakeProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> Url {
        Url::parse_with_params(
            "https://idp.test/authorize",
            &[("state", state), ("code_challenge", code_challenge)],
        )
        .unwrap()
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _code_verifier: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.reject_codes {
            return Err(ProviderError::Rejected {
                status: 400,
                detail: "invalid_grant".into(),
            });
        }
        Ok(ProviderIdentity {
            subject: "google-oauth2|1001".into(),
            email: "grace@example.edu".into(),
            given_name: Some("Grace".into()),
            family_name: Some("Hopper".into()),
            picture: None,
        })
    }
}

// =============================================================================
// Fake backend
// =============================================================================

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendMode {
    /// Issues a valid token pair.
    #[default]
    Issue,
    /// Rejects every call.
    Reject,
    /// Issues tokens signed with some other secret.
    IssueForeign,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub mode: BackendMode,
    pub logins: Arc<Mutex<Vec<String>>>,
    pub refreshed_with: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn with_mode(mode: BackendMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    fn issue(&self) -> ApiResult<TokenPair> {
        match self.mode {
            BackendMode::Issue => Ok(token_pair()),
            BackendMode::Reject => Err(ApiFailure::new(
                ApiFailureKind::Rejected(401),
                "Invalid refresh token",
            )),
            BackendMode::IssueForeign => {
                let now = now();
                let other = b"some-other-secret-entirely-32by!";
                Ok(TokenPair {
                    access_token: mint_with(other, &claims(TokenType::Access, now, now + 900)),
                    refresh_token: mint_with(other, &claims(TokenType::Refresh, now, now + 9000)),
                })
            }
        }
    }
}

impl SessionBackend for FakeBackend {
    async fn login(&self, request: &LoginRequest<'_>) -> ApiResult<TokenPair> {
        self.logins.lock().unwrap().push(request.email.to_string());
        self.issue()
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        self.refreshed_with
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.issue()
    }
}

// =============================================================================
// App and HTTP helpers
// =============================================================================

pub fn create_test_app(provider: FakeProvider, backend: FakeBackend) -> axum::Router {
    let auth = AuthState::new(TokenCodec::new(SECRET).unwrap(), false);
    create_app(auth, provider, backend)
}

pub fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookies: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get("location")
        .expect("no Location header")
        .to_str()
        .unwrap()
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value set for `name`, ignoring removals. The jar percent-encodes values,
/// so this decodes them.
pub fn set_cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies
        .iter()
        .filter(|c| c.starts_with(&prefix) && !c.contains("Max-Age=0"))
        .find_map(|c| c[prefix.len()..].split(';').next().map(percent_decode))
}

fn percent_decode(raw: &str) -> String {
    url::form_urlencoded::parse(format!("v={raw}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Check if cookies contain `name` being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], name: &str) -> bool {
    let prefix = format!("{name}=");
    cookies
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
