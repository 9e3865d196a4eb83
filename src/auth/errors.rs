//! Authentication error types.

use crate::jwt::{TokenType, VerificationFailure};

/// Failure to persist a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStoreError {
    /// One of the tokens failed verification; nothing was written.
    #[error("refusing to store unverifiable {token_type:?} token: {reason}")]
    InvalidTokenPair {
        token_type: TokenType,
        reason: VerificationFailure,
    },
}
