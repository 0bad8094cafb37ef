use thiserror::Error;

/// Errors surfaced by the account client and the session manager
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Account service rejected the request (code {code}): {message}")]
    Service { code: i64, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No OTP challenge is pending")]
    NoChallenge,

    #[error("Session expired")]
    SessionExpired,

    #[error("No services found on this account")]
    NoServices,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn service(code: i64, message: impl Into<String>) -> Self {
        Self::Service {
            code,
            message: message.into(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Profile store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access profile store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse profile store: {0}")]
    Json(#[from] serde_json::Error),
}
