//! Session token verification.
//!
//! Tokens are minted by the backend and signed with a secret shared with this
//! service. Only HS256 is accepted; a token carrying any other `alg` header is
//! rejected rather than negotiated.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigurationError;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Backend user identifier. The backend emits it either as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => UserId(s),
            Raw::Number(n) => UserId(n.to_string()),
        })
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verified payload of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Lifetime fields only. Used where the rest of the payload is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TokenLifetime {
    pub iat: u64,
    pub exp: u64,
}

impl TokenLifetime {
    /// Total lifetime in seconds.
    pub fn total(&self) -> u64 {
        self.exp.saturating_sub(self.iat)
    }

    /// Seconds left before `exp`, zero once expired.
    pub fn remaining(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now)
    }
}

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("wrong token type")]
    WrongTokenType,
}

/// Verifies HS256 session tokens against the shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec from the shared signing secret.
    ///
    /// An empty secret is a startup error, never a per-request one.
    pub fn new(secret: &[u8]) -> Result<Self, ConfigurationError> {
        if secret.is_empty() {
            return Err(ConfigurationError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Verify a token of either type.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, VerificationFailure> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| classify(e.kind()))
    }

    /// Verify a token and require it to be an access token.
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, VerificationFailure> {
        self.verify_typed(token, TokenType::Access)
    }

    /// Verify a token and require it to be a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, VerificationFailure> {
        self.verify_typed(token, TokenType::Refresh)
    }

    fn verify_typed(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, VerificationFailure> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(VerificationFailure::WrongTokenType);
        }
        Ok(claims)
    }
}

fn classify(kind: &ErrorKind) -> VerificationFailure {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            VerificationFailure::InvalidSignature
        }
        ErrorKind::ExpiredSignature => VerificationFailure::Expired,
        _ => VerificationFailure::Malformed,
    }
}

/// Read a JWT payload without checking its signature.
///
/// Only for holders that never see the secret (the refresh scheduler, the
/// identity provider's ID token after a successful exchange). Nothing decoded
/// here may grant access.
pub fn decode_unverified<T: DeserializeOwned>(token: &str) -> Result<T, VerificationFailure> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(VerificationFailure::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| VerificationFailure::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| VerificationFailure::Malformed)
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
