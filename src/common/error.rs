//! Error types for repfs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Store Errors ===
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Event log error: {0}")]
    Log(String),

    // === Network Errors ===
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Replica unavailable: {0}")]
    ReplicaUnavailable(String),

    #[error("Client unreachable: {0}")]
    ClientUnreachable(String),

    // === Role Errors ===
    #[error("Unsupported on this server role: {0}")]
    Unsupported(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a transport-level failure (unreachable peer, timed-out call)?
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::ReplicaUnavailable(_) | Error::ClientUnreachable(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidFileName(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Unsupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::Transport(_) | Error::ReplicaUnavailable(_) | Error::ClientUnreachable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.to_http_status();
        let body = axum::Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Internal(e.to_string())
    }
}
