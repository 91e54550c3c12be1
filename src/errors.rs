use thiserror::Error;

use crate::transport::JobId;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a usable response (connection, timeout, bad body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with `success: false`.
    #[error("Server rejected request: {0}")]
    Protocol(String),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No job selected")]
    NoJob,

    #[error("Abort is not available for job {0}")]
    AbortUnavailable(JobId),
}

impl ClientError {
    /// Transport-level failures, as opposed to an explicit rejection by the server.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Reqwest(_) | ClientError::SerdeJson(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(ClientError::Transport("connection refused".into()).is_transport());
        assert!(!ClientError::Protocol("Job not found".into()).is_transport());
        assert!(!ClientError::NoJob.is_transport());
    }

    #[test]
    fn test_protocol_message_is_surfaced() {
        let err = ClientError::Protocol("Invalid destination id".into());
        assert_eq!(err.to_string(), "Server rejected request: Invalid destination id");
    }
}
