use std::future::Future;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::validate_url;
use crate::error::ConfigurationError;
use crate::jwt::decode_unverified;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Identity fields taken from the provider's ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    #[serde(rename = "sub")]
    pub subject: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Failure of the code exchange. Codes are single-use, so none of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("token response carried no usable id_token")]
    MissingIdentity,
}

/// An OAuth2 identity provider supporting the PKCE authorization-code flow.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Name used in `/login/<provider>` routes.
    fn name(&self) -> &str;

    /// Authorization URL carrying `state` and the S256 challenge.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> Url;

    /// Redeem `code` with the matching verifier.
    fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> impl Future<Output = Result<ProviderIdentity, ProviderError>> + Send;
}

/// OAuth client credentials and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
    pub auth_url: Url,
    pub token_url: Url,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Google endpoints with `openid email profile` scopes.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: Url,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            name: "google".into(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri,
            auth_url: validate_url("oauth auth url", GOOGLE_AUTH_URL)?,
            token_url: validate_url("oauth token url", GOOGLE_TOKEN_URL)?,
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// `reqwest`-backed [`IdentityProvider`].
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthProvider {
    pub fn new(config: OAuthConfig) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { config, http })
    }
}

impl IdentityProvider for OAuthProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn authorization_url(&self, state: &str, code_challenge: &str) -> Url {
        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        url
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected { status, detail });
        }

        let tokens: TokenResponse = response.json().await?;
        let id_token = tokens.id_token.ok_or(ProviderError::MissingIdentity)?;

        // Not re-verified: it arrived directly from the token endpoint.
        decode_unverified(&id_token).map_err(|_| ProviderError::MissingIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OAuthProvider {
        let config = OAuthConfig::google(
            "test-client",
            None,
            Url::parse("https://tally.example.com/login/google/callback").unwrap(),
        )
        .unwrap();
        OAuthProvider::new(config).unwrap()
    }

    #[test]
    fn test_authorization_url_contains_pkce() {
        let url = provider().authorization_url("st4te", "ch4llenge");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("client_id"), Some("test-client"));
        assert_eq!(get("state"), Some("st4te"));
        assert_eq!(get("code_challenge"), Some("ch4llenge"));
        assert_eq!(get("code_challenge_method"), Some("S256"));
        assert_eq!(get("scope"), Some("openid email profile"));
        assert_eq!(
            get("redirect_uri"),
            Some("https://tally.example.com/login/google/callback")
        );
    }

    #[test]
    fn test_identity_from_id_token_claims() {
        let identity: ProviderIdentity = serde_json::from_value(serde_json::json!({
            "sub": "1234567890",
            "email": "ada@example.com",
            "given_name": "Ada",
            "aud": "ignored",
        }))
        .unwrap();

        assert_eq!(identity.subject, "1234567890");
        assert_eq!(identity.given_name.as_deref(), Some("Ada"));
        assert_eq!(identity.picture, None);
    }
}
