use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("Service error {code}: {message}")]
    Permanent { code: i64, message: String },

    #[error("Unexpected response format: {0}")]
    Protocol(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ServiceError {
    /// Error reported when a handle does not map to any entity
    pub fn not_found(handle: &str) -> Self {
        ServiceError::Permanent {
            code: 1,
            message: format!("User not found: {}", handle),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            ServiceError::Transient(e.to_string())
        } else if e.is_decode() {
            ServiceError::Protocol(e.to_string())
        } else if let Some(status) = e.status()
            && (status.is_server_error() || status.as_u16() == 429)
        {
            ServiceError::Transient(e.to_string())
        } else {
            ServiceError::Permanent {
                code: e.status().map(|s| s.as_u16() as i64).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Protocol(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
