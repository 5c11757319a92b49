use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    // --- Upstream API classification ---
    #[error("rate limited: {status}")]
    RateLimited { status: u16 },

    #[error("api error: {message} (status: {status})")]
    Api { message: String, status: u16 },

    #[error("http error: {status}")]
    HttpStatus { status: u16 },

    // --- Domain ---
    #[error("trader not found: {0}")]
    TraderNotFound(String),

    #[error("no analysis found for trader: {0}")]
    NoAnalysis(String),

    #[error("no thesis content to export")]
    EmptyThesis,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // --- Language model ---
    #[error("claude API key is not configured")]
    NoApiKey,

    #[error("empty response from claude")]
    EmptyResponse,

    #[error("invalid trader data")]
    InvalidTrader,

    #[error("analysis timed out after {0}s")]
    Timeout(u64),
}

impl AppError {
    /// Whether a failed request is worth another attempt.
    /// Transport failures and 5xx are transient; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AppError::HttpStatus { status } | AppError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_messages() {
        assert_eq!(AppError::RateLimited { status: 429 }.to_string(), "rate limited: 429");
        assert_eq!(
            AppError::Api { message: "bad market".into(), status: 400 }.to_string(),
            "api error: bad market (status: 400)"
        );
        assert_eq!(AppError::HttpStatus { status: 404 }.to_string(), "http error: 404");
        assert_eq!(AppError::NoApiKey.to_string(), "claude API key is not configured");
    }

    #[test]
    fn only_server_errors_retry() {
        assert!(AppError::HttpStatus { status: 502 }.is_retryable());
        assert!(AppError::Api { message: "down".into(), status: 503 }.is_retryable());
        assert!(!AppError::HttpStatus { status: 404 }.is_retryable());
        assert!(!AppError::RateLimited { status: 429 }.is_retryable());
        assert!(!AppError::EmptyThesis.is_retryable());
    }
}
