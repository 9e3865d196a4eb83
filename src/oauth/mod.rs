//! OAuth 2.0 authorization-code login with PKCE.

mod errors;
pub mod handshake;
pub mod pkce;
mod provider;
mod routes;

pub use errors::HandshakeError;
pub use handshake::{DEFAULT_POST_LOGIN_PATH, HandshakeState, ReturnedHandshake};
pub use provider::{IdentityProvider, OAuthConfig, OAuthProvider, ProviderError, ProviderIdentity};
pub use routes::router;
