use std::fmt;

/// Error types that can occur when driving a conversation against the
/// generative-language API.
///
/// The system distinguishes three informal classes: configuration problems
/// (missing credential — user-correctable, checked before any remote call),
/// remote-service failures (HTTP transport, provider-reported errors, bad
/// response payloads — never retried), and input problems (degenerate or
/// unreadable images). There is deliberately no finer taxonomy and no retry
/// or backoff policy.
#[derive(Debug)]
pub enum PlaygroundError {
    /// Missing or unusable credential configuration
    ConfigError(String),
    /// HTTP request/response errors
    HttpError(String),
    /// Errors reported by the generative service
    ProviderError(String),
    /// JSON serialization/deserialization errors
    JsonError(String),
    /// Unusable input: degenerate image, unreadable file path
    InputError(String),
}

impl fmt::Display for PlaygroundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaygroundError::ConfigError(e) => write!(f, "Configuration Error: {}", e),
            PlaygroundError::HttpError(e) => write!(f, "HTTP Error: {}", e),
            PlaygroundError::ProviderError(e) => write!(f, "Provider Error: {}", e),
            PlaygroundError::JsonError(e) => write!(f, "JSON Parse Error: {}", e),
            PlaygroundError::InputError(e) => write!(f, "Input Error: {}", e),
        }
    }
}

impl std::error::Error for PlaygroundError {}

/// Converts reqwest HTTP errors into PlaygroundErrors
impl From<reqwest::Error> for PlaygroundError {
    fn from(err: reqwest::Error) -> Self {
        PlaygroundError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for PlaygroundError {
    fn from(err: serde_json::Error) -> Self {
        PlaygroundError::JsonError(err.to_string())
    }
}

impl From<image::ImageError> for PlaygroundError {
    fn from(err: image::ImageError) -> Self {
        PlaygroundError::InputError(err.to_string())
    }
}

impl From<std::io::Error> for PlaygroundError {
    fn from(err: std::io::Error) -> Self {
        PlaygroundError::InputError(err.to_string())
    }
}
