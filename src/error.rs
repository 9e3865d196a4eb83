//! Startup-time configuration errors.

/// Fatal misconfiguration detected before the server starts accepting requests.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("session signing secret is not set")]
    MissingSecret,
    #[error("failed to read {what} from {path}: {source}")]
    Unreadable {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is required")]
    Missing { name: &'static str },
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
