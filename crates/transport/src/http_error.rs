//! Error types for the HTTP sync transport (§6, §7 "Transport").

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HttpTransportError>;

#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid session token format")]
    Auth,
}

impl HttpTransportError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
