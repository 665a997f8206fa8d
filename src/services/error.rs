use thiserror::Error;

use crate::{application::error::ApplicationError, domain::config::ConfigError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to connect to storage: {0}")]
    ConnectFailure(String),

    #[error("Failed to ping storage: {0}")]
    PingFailure(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("{op}: file {id} not found")]
    NotFound { op: &'static str, id: String },

    #[error("{op}: invalid input: {reason}")]
    InvalidInput { op: &'static str, reason: String },

    #[error("{op}: read failed: {reason}")]
    ReadFailure { op: &'static str, reason: String },

    #[error("{op}: write failed: {reason}")]
    WriteFailure { op: &'static str, reason: String },

    #[error("{op}: cancelled")]
    Cancelled { op: &'static str },

    #[error("{op}: deadline exceeded")]
    DeadlineExceeded { op: &'static str },
}

impl StorageError {
    pub fn not_found(op: &'static str, id: impl Into<String>) -> Self {
        StorageError::NotFound { op, id: id.into() }
    }

    pub fn invalid_input(op: &'static str, reason: impl ToString) -> Self {
        StorageError::InvalidInput {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn read_failure(op: &'static str, reason: impl ToString) -> Self {
        StorageError::ReadFailure {
            op,
            reason: reason.to_string(),
        }
    }

    pub fn write_failure(op: &'static str, reason: impl ToString) -> Self {
        StorageError::WriteFailure {
            op,
            reason: reason.to_string(),
        }
    }

    /// Only startup connection failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectFailure(_) | StorageError::PingFailure(_)
        )
    }
}

impl From<ConfigError> for StorageError {
    fn from(error: ConfigError) -> Self {
        StorageError::InvalidConfig(error.to_string())
    }
}

impl From<StorageError> for ApplicationError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { .. } => ApplicationError::NotFound(error.to_string()),
            StorageError::InvalidInput { .. } => ApplicationError::InvalidInput(error.to_string()),
            StorageError::ReadFailure { .. } => ApplicationError::ReadFailure(error.to_string()),
            StorageError::WriteFailure { .. } => ApplicationError::WriteFailure(error.to_string()),
            StorageError::Cancelled { .. } => ApplicationError::Cancelled,
            StorageError::DeadlineExceeded { .. } => ApplicationError::DeadlineExceeded,
            StorageError::ConnectFailure(_)
            | StorageError::PingFailure(_)
            | StorageError::Unavailable(_) => ApplicationError::Unavailable(error.to_string()),
            StorageError::InvalidConfig(msg) => {
                ApplicationError::InternalError(format!("Storage misconfigured: {}", msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connect_and_ping_failures_are_retryable() {
        assert!(StorageError::ConnectFailure("refused".into()).is_retryable());
        assert!(StorageError::PingFailure("timeout".into()).is_retryable());

        assert!(!StorageError::InvalidConfig("bad uri".into()).is_retryable());
        assert!(!StorageError::not_found("get", "abc").is_retryable());
        assert!(!StorageError::write_failure("save", "disk full").is_retryable());
        assert!(!StorageError::DeadlineExceeded { op: "get" }.is_retryable());
    }

    #[test]
    fn messages_carry_operation_and_id() {
        let err = StorageError::not_found("delete", "64f1a2b3c4d5e6f7a8b9c0d1");
        assert_eq!(
            err.to_string(),
            "delete: file 64f1a2b3c4d5e6f7a8b9c0d1 not found"
        );
    }

    #[test]
    fn kinds_stay_distinct_in_the_application_layer() {
        assert!(matches!(
            ApplicationError::from(StorageError::not_found("get", "x")),
            ApplicationError::NotFound(_)
        ));
        assert!(matches!(
            ApplicationError::from(StorageError::invalid_input("get", "bad id")),
            ApplicationError::InvalidInput(_)
        ));
        assert!(matches!(
            ApplicationError::from(StorageError::read_failure("get", "reset")),
            ApplicationError::ReadFailure(_)
        ));
        assert!(matches!(
            ApplicationError::from(StorageError::write_failure("save", "full")),
            ApplicationError::WriteFailure(_)
        ));
        assert!(matches!(
            ApplicationError::from(StorageError::Cancelled { op: "get" }),
            ApplicationError::Cancelled
        ));
        assert!(matches!(
            ApplicationError::from(StorageError::DeadlineExceeded { op: "get" }),
            ApplicationError::DeadlineExceeded
        ));
    }
}
