//! Content Security Policy middleware.
//!
//! Pages carry no scripts and a single inline stylesheet, so the policy allows
//! exactly that stylesheet by hash and nothing else executable.

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response, header},
    middleware::Next,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use crate::pages::PAGE_STYLE;

/// Compute SHA-256 hash of content and return base64-encoded hash for CSP.
fn compute_hash(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    format!("'sha256-{}'", STANDARD.encode(hash))
}

/// Built once from the page stylesheet.
static CSP_HEADER_VALUE: LazyLock<Option<HeaderValue>> = LazyLock::new(|| {
    // img-src allows https: for provider avatars.
    let policy = format!(
        "default-src 'none'; \
         style-src {}; \
         img-src 'self' https:; \
         form-action 'self'; \
         frame-ancestors 'none'; \
         base-uri 'none'",
        compute_hash(PAGE_STYLE)
    );
    HeaderValue::from_str(&policy).ok()
});

/// Middleware that adds Content-Security-Policy headers to responses.
pub async fn csp_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    if let Some(csp) = CSP_HEADER_VALUE.as_ref() {
        headers.insert(header::CONTENT_SECURITY_POLICY, csp.clone());
    }
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    response
}
