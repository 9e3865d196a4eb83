//! Cookie-carried sessions.
//!
//! Access and refresh tokens are minted by the backend and stored in two
//! `HttpOnly` cookies whose lifetime matches the tokens' own `exp`. Every
//! request resolves a fresh [`Session`] from those cookies.

pub mod cookie;
mod errors;
mod extractors;
mod guard;
mod ip;
mod session;
mod state;
mod store;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
pub use errors::SessionStoreError;
pub use extractors::CurrentSession;
pub use guard::{GuardDecision, LOGIN_PATH, LOGOUT_PATH, decide, is_guarded, route_guard};
pub use ip::client_ip;
pub use session::{Session, UserSummary, resolve};
pub use state::{AuthState, HasAuthState};
pub use store::{SessionStore, StoredTokens};
