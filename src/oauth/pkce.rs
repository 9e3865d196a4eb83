//! PKCE and state generation (RFC 7636).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

fn random_url_safe<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 64-character URL-safe code verifier (48 random bytes).
pub fn generate_code_verifier() -> String {
    random_url_safe::<48>()
}

/// `BASE64URL(SHA256(verifier))`
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// 43-character anti-CSRF state (32 random bytes).
pub fn generate_state() -> String {
    random_url_safe::<32>()
}
