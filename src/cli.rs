//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::error::ConfigurationError;
use crate::oauth::OAuthConfig;
use clap::Parser;
use tracing::warn;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;

const SESSION_SECRET_ENV: &str = "SESSION_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Tallyroom",
    about = "Classroom sign-in gateway: OAuth login and JWT cookie sessions"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Path to file containing the session secret. Prefer using SESSION_SECRET env var instead
    #[arg(long)]
    pub session_secret_file: Option<String>,

    /// Backend API base URL (issues and refreshes session tokens)
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8080")]
    pub backend_url: String,

    /// Identity provider name, used in /login/{provider}
    #[arg(long, default_value = "google")]
    pub provider: String,

    #[arg(long, env = "OAUTH_CLIENT_ID")]
    pub oauth_client_id: Option<String>,

    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    pub oauth_client_secret: Option<String>,

    /// Callback URL registered with the provider, e.g. "https://example.com/login/google/callback"
    #[arg(long, env = "OAUTH_REDIRECT_URI")]
    pub oauth_redirect_uri: Option<String>,

    /// Authorization endpoint (defaults to Google's for the google provider)
    #[arg(long)]
    pub oauth_auth_url: Option<String>,

    /// Token endpoint (defaults to Google's for the google provider)
    #[arg(long)]
    pub oauth_token_url: Option<String>,

    /// Serve cookies with the Secure flag (requires HTTPS)
    #[arg(long, env = "PRODUCTION")]
    pub production: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the session secret from the environment or a file.
pub fn load_session_secret(
    session_secret_file: Option<&str>,
) -> Result<Vec<u8>, ConfigurationError> {
    let secret = if let Ok(secret) = std::env::var(SESSION_SECRET_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(SESSION_SECRET_ENV) };
        secret
    } else if let Some(path) = session_secret_file {
        std::fs::read_to_string(path)
            .map_err(|source| ConfigurationError::Unreadable {
                what: "session secret",
                path: path.to_string(),
                source,
            })?
            .trim()
            .to_string()
    } else {
        return Err(ConfigurationError::MissingSecret);
    };

    check_secret(secret.into_bytes())
}

fn check_secret(secret: Vec<u8>) -> Result<Vec<u8>, ConfigurationError> {
    if secret.is_empty() {
        return Err(ConfigurationError::MissingSecret);
    }
    if secret.len() < MIN_SESSION_SECRET_LENGTH {
        warn!(
            "Session secret is shorter than {} bytes. Use a longer secret",
            MIN_SESSION_SECRET_LENGTH
        );
    }
    Ok(secret)
}

/// Parse a URL option.
pub fn validate_url(name: &'static str, value: &str) -> Result<Url, ConfigurationError> {
    Url::parse(value).map_err(|source| ConfigurationError::InvalidUrl { name, source })
}

fn required<'a>(name: &'static str, value: Option<&'a str>) -> Result<&'a str, ConfigurationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ConfigurationError::Missing { name })
}

/// Identity provider settings from arguments.
pub fn build_oauth_config(args: &Args) -> Result<OAuthConfig, ConfigurationError> {
    let client_id = required("OAUTH_CLIENT_ID", args.oauth_client_id.as_deref())?;
    let redirect_uri = validate_url(
        "OAUTH_REDIRECT_URI",
        required("OAUTH_REDIRECT_URI", args.oauth_redirect_uri.as_deref())?,
    )?;
    let client_secret = args.oauth_client_secret.clone().filter(|s| !s.is_empty());

    let mut config = if args.provider == "google" {
        OAuthConfig::google(client_id, client_secret, redirect_uri)?
    } else {
        OAuthConfig {
            name: args.provider.clone(),
            client_id: client_id.to_string(),
            client_secret,
            redirect_uri,
            auth_url: validate_url(
                "--oauth-auth-url",
                required("--oauth-auth-url", args.oauth_auth_url.as_deref())?,
            )?,
            token_url: validate_url(
                "--oauth-token-url",
                required("--oauth-token-url", args.oauth_token_url.as_deref())?,
            )?,
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
        }
    };

    if let Some(url) = args.oauth_auth_url.as_deref() {
        config.auth_url = validate_url("--oauth-auth-url", url)?;
    }
    if let Some(url) = args.oauth_token_url.as_deref() {
        config.token_url = validate_url("--oauth-token-url", url)?;
    }

    Ok(config)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, session_secret: Vec<u8>) -> Result<ServerConfig, ConfigurationError> {
    Ok(ServerConfig {
        session_secret,
        secure_cookies: args.production,
        backend_url: validate_url("BACKEND_URL", &args.backend_url)?,
        oauth: build_oauth_config(args)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "tallyroom",
            "--oauth-client-id",
            "client-123",
            "--oauth-redirect-uri",
            "http://localhost:3000/login/google/callback",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        assert_eq!(args.provider, "google");
        assert!(args.oauth_auth_url.is_none());
    }

    #[test]
    fn test_google_config() {
        let config = build_config(&args(&["--production"]), vec![b'k'; 32]).unwrap();
        assert!(config.secure_cookies);
        assert_eq!(config.oauth.name, "google");
        assert_eq!(config.oauth.client_id, "client-123");
        assert_eq!(config.oauth.auth_url.host_str(), Some("accounts.google.com"));
    }

    #[test]
    fn test_other_provider_needs_endpoints() {
        let err = build_oauth_config(&args(&["--provider", "school"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Missing {
                name: "--oauth-auth-url"
            }
        ));

        let config = build_oauth_config(&args(&[
            "--provider",
            "school",
            "--oauth-auth-url",
            "https://sso.example.edu/authorize",
            "--oauth-token-url",
            "https://sso.example.edu/token",
        ]))
        .unwrap();
        assert_eq!(config.name, "school");
        assert_eq!(config.token_url.as_str(), "https://sso.example.edu/token");
    }

    #[test]
    fn test_invalid_backend_url() {
        let Err(err) = build_config(&args(&["--backend-url", "not a url"]), vec![b'k'; 32]) else {
            panic!("invalid backend URL accepted");
        };
        assert!(matches!(
            err,
            ConfigurationError::InvalidUrl {
                name: "BACKEND_URL",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_secret_rejected_short_secret_accepted() {
        assert!(matches!(
            check_secret(Vec::new()),
            Err(ConfigurationError::MissingSecret)
        ));
        assert_eq!(check_secret(b"short".to_vec()).unwrap(), b"short");
    }
}
