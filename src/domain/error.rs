use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    /// A required setting is missing; raised before any network call.
    Precondition(String),
    /// The remote service answered with a non-success response.
    RemoteRejected { service: String, message: String },
    /// The request never completed (connection, timeout, body read).
    Transport(String),
    /// A multi-step operation failed after an earlier step succeeded.
    PartialFailure(String),
    ValidationError(String),
    InvalidTransition(String),
    ParseError(String),
    ConfigError(String),
    SecurityError(String),
    /// Another mutating call is already in flight for the current item.
    Busy,
    IoError(String),
}

impl AppError {
    pub fn remote(service: &str, message: impl Into<String>) -> Self {
        AppError::RemoteRejected {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Rejections, transport failures and half-finished composites.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AppError::RemoteRejected { .. } | AppError::Transport(_) | AppError::PartialFailure(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Precondition(msg) => write!(f, "Missing setting: {}", msg),
            AppError::RemoteRejected { message, .. } => write!(f, "{}", message),
            AppError::Transport(msg) => write!(f, "Transport error: {}", msg),
            AppError::PartialFailure(msg) => write!(f, "Partial failure: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::Busy => write!(f, "Another action is still in progress"),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_rejection_displays_the_service_message_verbatim() {
        let err = AppError::remote("notion", "validation_error: database_id invalid");
        assert_eq!(err.to_string(), "validation_error: database_id invalid");
        assert!(err.is_remote());
    }

    #[test]
    fn transport_errors_carry_a_distinguishing_prefix() {
        let err = AppError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }

    #[test]
    fn precondition_is_not_a_remote_error() {
        assert!(!AppError::Precondition("notionToken".to_string()).is_remote());
    }
}
