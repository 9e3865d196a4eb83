//! Client for the backend's auth endpoints.
//!
//! Every backend response is wrapped in `{ success, message, data }`. That
//! envelope is turned into a plain `Result<T, ApiFailure>` here so callers
//! match on a closed set of failure kinds instead of poking at JSON.

use std::future::Future;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigurationError;
use crate::oauth::ProviderIdentity;

/// Response envelope used by every backend endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// What went wrong talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFailureKind {
    /// Network or connection failure.
    Transport,
    /// Non-2xx HTTP status.
    Rejected(u16),
    /// 2xx with `success: false` or no `data`.
    Unsuccessful,
    /// Body did not match the expected shape.
    Decode,
}

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ApiFailure {
    pub kind: ApiFailureKind,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiFailure {
    pub fn new(kind: ApiFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

pub type ApiResult<T> = Result<T, ApiFailure>;

/// Access/refresh pair as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokensData {
    tokens: TokenPair,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub provider: &'a str,
    pub provider_id: &'a str,
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

impl<'a> LoginRequest<'a> {
    pub fn from_identity(provider: &'a str, identity: &'a ProviderIdentity) -> Self {
        Self {
            provider,
            provider_id: &identity.subject,
            email: &identity.email,
            first_name: identity.given_name.as_deref(),
            last_name: identity.family_name.as_deref(),
            avatar_url: identity.picture.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// The backend operations this service relies on.
pub trait SessionBackend: Send + Sync + 'static {
    /// Exchange a provider identity for a fresh token pair.
    fn login(&self, request: &LoginRequest<'_>) -> impl Future<Output = ApiResult<TokenPair>> + Send;

    /// Exchange a refresh token for a fresh token pair.
    fn refresh(&self, refresh_token: &str) -> impl Future<Output = ApiResult<TokenPair>> + Send;
}

/// `reqwest`-backed [`SessionBackend`].
#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(mut base_url: Url) -> Result<Self, ConfigurationError> {
        // Relative joins drop the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ApiFailure::new(ApiFailureKind::Transport, format!("bad endpoint: {e}")))
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiFailure::new(ApiFailureKind::Transport, e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiFailure::new(ApiFailureKind::Transport, e.to_string()))?;

        unwrap_envelope(status, &bytes)
    }
}

impl SessionBackend for BackendClient {
    async fn login(&self, request: &LoginRequest<'_>) -> ApiResult<TokenPair> {
        let data: TokensData = self.post("auth/login", request).await?;
        Ok(data.tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let data: TokensData = self
            .post("auth/refresh-token", &RefreshRequest { refresh_token })
            .await?;
        Ok(data.tokens)
    }
}

/// Decode a backend body into `data`, or a tagged failure.
fn unwrap_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ApiResult<T> {
    let raw: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) if status.is_success() => {
            return Err(ApiFailure::new(ApiFailureKind::Decode, e.to_string()));
        }
        Err(_) => {
            let text = String::from_utf8_lossy(body).into_owned();
            return Err(ApiFailure::new(
                ApiFailureKind::Rejected(status.as_u16()),
                text,
            ));
        }
    };

    if !status.is_success() {
        let message = raw
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(
            ApiFailure::new(ApiFailureKind::Rejected(status.as_u16()), message).with_details(raw),
        );
    }

    let envelope: Envelope<serde_json::Value> = serde_json::from_value(raw.clone())
        .map_err(|e| ApiFailure::new(ApiFailureKind::Decode, e.to_string()))?;

    match envelope.data {
        Some(data) if envelope.success => serde_json::from_value(data)
            .map_err(|e| ApiFailure::new(ApiFailureKind::Decode, e.to_string())),
        _ => Err(ApiFailure::new(ApiFailureKind::Unsuccessful, envelope.message).with_details(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(status: u16, body: serde_json::Value) -> ApiResult<TokenPair> {
        unwrap_envelope::<TokensData>(
            StatusCode::from_u16(status).unwrap(),
            body.to_string().as_bytes(),
        )
        .map(|d| d.tokens)
    }

    #[test]
    fn test_success_envelope() {
        let pair = decode(
            200,
            serde_json::json!({
                "success": true,
                "message": "ok",
                "data": { "tokens": { "access_token": "a", "refresh_token": "r" } }
            }),
        )
        .unwrap();

        assert_eq!(pair.access_token, "a");
        assert_eq!(pair.refresh_token, "r");
    }

    #[test]
    fn test_unsuccessful_envelope() {
        let err = decode(
            200,
            serde_json::json!({ "success": false, "message": "nope", "data": null }),
        )
        .unwrap_err();

        assert_eq!(err.kind, ApiFailureKind::Unsuccessful);
        assert_eq!(err.message, "nope");
        assert!(err.details.is_some());
    }

    #[test]
    fn test_rejected_status() {
        let err = decode(
            401,
            serde_json::json!({ "success": false, "message": "Refresh token expired", "data": null }),
        )
        .unwrap_err();

        assert_eq!(err.kind, ApiFailureKind::Rejected(401));
        assert_eq!(err.message, "Refresh token expired");
    }

    #[test]
    fn test_non_json_error_body() {
        let err = unwrap_envelope::<TokensData>(StatusCode::BAD_GATEWAY, b"upstream down")
            .unwrap_err();
        assert_eq!(err.kind, ApiFailureKind::Rejected(502));
        assert_eq!(err.message, "upstream down");
    }

    #[test]
    fn test_rejected_without_envelope() {
        let err = decode(403, serde_json::json!({ "error": "forbidden" })).unwrap_err();
        assert_eq!(err.kind, ApiFailureKind::Rejected(403));
    }

    #[test]
    fn test_wrong_data_shape() {
        let err = decode(
            200,
            serde_json::json!({ "success": true, "message": "", "data": { "tokens": 5 } }),
        )
        .unwrap_err();
        assert_eq!(err.kind, ApiFailureKind::Decode);
    }

    #[test]
    fn test_login_request_from_identity() {
        let identity = ProviderIdentity {
            subject: "g-123".into(),
            email: "ada@example.com".into(),
            given_name: Some("Ada".into()),
            family_name: None,
            picture: None,
        };
        let body = serde_json::to_value(LoginRequest::from_identity("google", &identity)).unwrap();

        assert_eq!(body["provider"], "google");
        assert_eq!(body["provider_id"], "g-123");
        assert_eq!(body["first_name"], "Ada");
        assert_eq!(body["last_name"], serde_json::Value::Null);
    }
}
