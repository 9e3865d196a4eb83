//! Server-rendered pages: login, logout and the signed-in landing page.

use axum::{
    Router,
    extract::{OriginalUri, Query, RawQuery, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use time::Duration;
use url::form_urlencoded;

use crate::auth::cookie::{LOGIN_ERROR_COOKIE_NAME, build_cookie, removal_cookie};
use crate::auth::{CurrentSession, LOGIN_PATH, LOGOUT_PATH, Session, is_guarded};
use crate::backend::SessionBackend;
use crate::oauth::IdentityProvider;
use crate::state::AppState;

/// How long a login error survives waiting to be shown.
const FLASH_TTL: Duration = Duration::seconds(60);

/// Shared stylesheet, inlined into every page and hashed into the CSP.
pub const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:32rem;\
margin:4rem auto;padding:0 1rem;color:#1f2933}\
.error{background:#fde8e8;color:#9b1c1c;padding:.75rem 1rem;border-radius:.375rem}\
.provider{display:inline-block;padding:.6rem 1.2rem;border:1px solid #cbd2d9;\
border-radius:.375rem;text-decoration:none;color:inherit}\
img.avatar{width:3rem;height:3rem;border-radius:50%}";

const NO_CACHE: &str = "no-store";

pub fn router<P, B>(state: AppState<P, B>) -> Router
where
    P: IdentityProvider,
    B: SessionBackend,
{
    Router::new()
        .route(LOGIN_PATH, get(login_page::<P, B>))
        .route("/login/", get(login_trailing_slash))
        .route(LOGOUT_PATH, get(logout::<P, B>).post(logout::<P, B>))
        .fallback(home_page::<P, B>)
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    error: Option<String>,
    redirect_url: Option<String>,
}

/// `GET /login`.
///
/// An `?error=` parameter is parked in a flash cookie and the browser is sent
/// back to a clean URL, where the message is shown once.
async fn login_page<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
) -> Response {
    let redirect_query = params
        .redirect_url
        .as_deref()
        .map(|r| format!("?redirect_url={}", encode(r)))
        .unwrap_or_default();

    if let Some(error) = params.error {
        let jar = jar.add(build_cookie(
            LOGIN_ERROR_COOKIE_NAME,
            error_code(&error),
            FLASH_TTL,
            state.auth.secure_cookies,
        ));
        return (jar, Redirect::to(&format!("{LOGIN_PATH}{redirect_query}"))).into_response();
    }

    let flash = jar
        .get(LOGIN_ERROR_COOKIE_NAME)
        .map(|c| c.value().to_owned());
    let jar = if flash.is_some() {
        jar.remove(removal_cookie(LOGIN_ERROR_COOKIE_NAME))
    } else {
        jar
    };

    let provider = state.provider.name();
    let mut body = String::from("<h1>Sign in</h1>");
    if let Some(code) = flash.as_deref() {
        body.push_str(&format!(
            "<p class=\"error\" role=\"alert\">{}</p>",
            escape_html(login_error_message(code))
        ));
    }
    body.push_str(&format!(
        "<p><a class=\"provider\" href=\"{}/{}{}\">Continue with {}</a></p>",
        LOGIN_PATH,
        escape_html(&encode(provider)),
        escape_html(&redirect_query),
        escape_html(&provider_label(provider)),
    ));

    (jar, page("Sign in", &body)).into_response()
}

/// `GET /login/` is the login page under another name.
async fn login_trailing_slash(RawQuery(query): RawQuery) -> Redirect {
    match query {
        Some(query) => Redirect::temporary(&format!("{LOGIN_PATH}?{query}")),
        None => Redirect::temporary(LOGIN_PATH),
    }
}

/// User-facing text for a login error code.
pub fn login_error_message(code: &str) -> &'static str {
    match code {
        "access_denied" => "Sign-in was cancelled.",
        "login_failed" => "We could not sign you in. Please try again.",
        "session_failed" => "Your session could not be started. Please try again.",
        _ => "Something went wrong while signing in. Please try again.",
    }
}

/// Error codes are plain identifiers; anything else collapses to `unknown`.
fn error_code(raw: &str) -> String {
    let valid = !raw.is_empty()
        && raw.len() <= 64
        && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid { raw.to_string() } else { "unknown".to_string() }
}

fn provider_label(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Logout ─────────────────────────────────────────────────────────

/// `GET|POST /logout`: drop both session cookies.
async fn logout<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    tracing::debug!("Logging out");
    (state.auth.store().clear(jar), Redirect::to(LOGIN_PATH))
}

// ── Landing page ───────────────────────────────────────────────────

/// Signed-in landing page for every other guarded path.
///
/// The guard lets a lapsed access token through when a refresh token is
/// present. That session is renewed here; if the backend refuses, both
/// cookies go and the visitor is sent to log in again.
async fn home_page<P: IdentityProvider, B: SessionBackend>(
    State(state): State<AppState<P, B>>,
    CurrentSession(session): CurrentSession,
    OriginalUri(uri): OriginalUri,
    jar: CookieJar,
) -> Response {
    if !is_guarded(uri.path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if session.is_authenticated {
        return page("Home", &home_body(&session)).into_response();
    }

    let return_to = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    let Some(refresh_token) = session.refresh_token else {
        return login_redirect(&return_to).into_response();
    };

    match state.renew_session(jar.clone(), &refresh_token).await {
        Ok((jar, session)) => {
            tracing::debug!("Session renewed on page load");
            (jar, page("Home", &home_body(&session))).into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "Session renewal failed, logging out");
            let jar = state.auth.store().clear(jar);
            (jar, login_redirect(&return_to)).into_response()
        }
    }
}

fn login_redirect(return_to: &str) -> Redirect {
    Redirect::to(&format!("{LOGIN_PATH}?redirect_url={}", encode(return_to)))
}

fn home_body(session: &Session) -> String {
    let logout_form = format!(
        "<form method=\"post\" action=\"{LOGOUT_PATH}\"><button type=\"submit\">Sign out</button></form>"
    );

    match &session.user {
        Some(user) => {
            let avatar = user
                .avatar_url
                .as_deref()
                .filter(|u| u.starts_with("https://"))
                .map(|u| {
                    format!(
                        "<img class=\"avatar\" src=\"{}\" alt=\"\">",
                        escape_html(u)
                    )
                })
                .unwrap_or_default();
            format!(
                "{avatar}<h1>Welcome, {}</h1><p>Signed in as {}.</p>{logout_form}",
                escape_html(&user.display_name()),
                escape_html(&user.email),
            )
        }
        None => format!("<h1>Welcome back</h1>{logout_form}"),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn page(title: &str, body: &str) -> Response {
    let html = format!(
        "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
         <title>{}</title><style>{PAGE_STYLE}</style></head><body>{body}</body></html>",
        escape_html(title)
    );
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, NO_CACHE)],
        Html(html),
    )
        .into_response()
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserSummary;
    use crate::jwt::UserId;

    fn user(first: Option<&str>) -> UserSummary {
        UserSummary {
            id: UserId("7".into()),
            email: "ada@example.com".into(),
            first_name: first.map(String::from),
            last_name: None,
            avatar_url: None,
            created_at: None,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_home_names_user() {
        let session = Session {
            is_authenticated: true,
            user: Some(user(Some("Ada"))),
            access_token: Some("a".into()),
            refresh_token: None,
        };
        assert!(home_body(&session).contains("Welcome, Ada"));
    }

    #[test]
    fn test_home_escapes_user_fields() {
        let session = Session {
            is_authenticated: true,
            user: Some(user(Some("<b>Ada</b>"))),
            access_token: Some("a".into()),
            refresh_token: None,
        };
        let body = home_body(&session);
        assert!(body.contains("&lt;b&gt;Ada&lt;/b&gt;"));
        assert!(!body.contains("<b>Ada"));
    }

    #[test]
    fn test_unknown_error_code_gets_generic_message() {
        assert_eq!(
            login_error_message("<img src=x>"),
            "Something went wrong while signing in. Please try again."
        );
        assert_eq!(login_error_message("access_denied"), "Sign-in was cancelled.");
    }

    #[test]
    fn test_error_code_is_cookie_safe() {
        assert_eq!(error_code("login_failed"), "login_failed");
        assert_eq!(error_code("a; Path=/admin"), "unknown");
        assert_eq!(error_code(""), "unknown");
    }

    #[test]
    fn test_provider_label() {
        assert_eq!(provider_label("google"), "Google");
        assert_eq!(provider_label(""), "");
    }
}
