//! Route guard middleware.
//!
//! Runs on every request, resolves the session and sorts the request into
//! "has some chance of being logged in" or "definitely not". It never
//! refreshes tokens itself.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use url::form_urlencoded;

use super::session::Session;
use super::state::AuthState;

/// Path of the login page.
pub const LOGIN_PATH: &str = "/login";

/// Path prefixes the guard never looks at.
const EXCLUDED_PREFIXES: &[&str] = &["/api/", "/static/", "/assets/", "/.well-known/"];

/// Exact paths the guard never looks at.
const EXCLUDED_PATHS: &[&str] = &[
    "/api",
    "/favicon.ico",
    "/robots.txt",
    "/sitemap.xml",
    LOGOUT_PATH,
];

/// Logging out must work with or without credentials.
pub const LOGOUT_PATH: &str = "/logout";

/// Decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin { return_to: String },
    RedirectToRoot,
}

impl GuardDecision {
    fn into_redirect(self) -> Option<Redirect> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::RedirectToLogin { return_to } => {
                let encoded: String = form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
                Some(Redirect::temporary(&format!(
                    "{LOGIN_PATH}?redirect_url={encoded}"
                )))
            }
            GuardDecision::RedirectToRoot => Some(Redirect::temporary("/")),
        }
    }
}

/// Whether `path` falls under the guard at all.
pub fn is_guarded(path: &str) -> bool {
    !(EXCLUDED_PATHS.contains(&path) || EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p)))
}

fn is_login_page(path: &str) -> bool {
    path == LOGIN_PATH
}

/// The OAuth handshake routes live under the login page.
fn is_login_area(path: &str) -> bool {
    is_login_page(path) || path.starts_with("/login/")
}

/// Apply the routing rules, in order.
pub fn decide(session: &Session, path: &str, path_and_query: &str) -> GuardDecision {
    if !session.has_credentials() && !is_login_area(path) {
        return GuardDecision::RedirectToLogin {
            return_to: path_and_query.to_string(),
        };
    }

    if is_login_page(path) && session.has_credentials() {
        return GuardDecision::RedirectToRoot;
    }

    GuardDecision::Allow
}

/// Middleware enforcing the authenticated/unauthenticated routing rules.
///
/// The resolved session is stored in the request extensions for handlers.
/// Cookie changes made while resolving are attached to whatever response goes
/// out, redirect or not. A cookie the handler sets itself wins over the
/// guard's change to the same cookie.
pub async fn route_guard(
    State(auth): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !is_guarded(&path) {
        return next.run(request).await;
    }

    let (jar, session) = auth.resolve(jar);
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let decision = decide(&session, &path, &path_and_query);
    if let Some(redirect) = decision.clone().into_redirect() {
        tracing::debug!(path = %path, decision = ?decision, "Route guard redirect");
        return (jar, redirect).into_response();
    }

    request.extensions_mut().insert(session);
    let response = next.run(request).await;
    merge_cookies(jar, response)
}

fn merge_cookies(jar: CookieJar, mut response: Response) -> Response {
    let set_by_handler: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(cookie_name)
        .collect();

    let guard = jar.into_response();
    for value in guard.headers().get_all(SET_COOKIE) {
        let overridden = cookie_name(value).is_some_and(|name| set_by_handler.contains(&name));
        if !overridden {
            response.headers_mut().append(SET_COOKIE, value.clone());
        }
    }
    response
}

fn cookie_name(value: &HeaderValue) -> Option<String> {
    let (name, _) = value.to_str().ok()?.split_once('=')?;
    Some(name.trim().to_string())
}
