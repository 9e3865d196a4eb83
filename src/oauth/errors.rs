use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Per-login-attempt failures answered with a plain 4xx.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("missing code, state or handshake cookies")]
    MissingParameters,
    #[error("state does not match")]
    StateMismatch,
    #[error("authorization code exchange failed")]
    ExchangeFailed,
    #[error("unknown identity provider")]
    UnknownProvider,
}

impl HandshakeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameters | Self::StateMismatch | Self::ExchangeFailed => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownProvider => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
