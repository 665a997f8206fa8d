use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::application::error::ApplicationError;

impl ApplicationError {
    /// Status and stable error code sent to clients.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApplicationError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApplicationError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            ApplicationError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApplicationError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            ApplicationError::ReadFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "READ_FAILURE"),
            ApplicationError::WriteFailure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "WRITE_FAILURE")
            }
            ApplicationError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED"),
            ApplicationError::DeadlineExceeded => {
                (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED")
            }
            ApplicationError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            ApplicationError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let error_message = match self {
            ApplicationError::NotFound(ref msg) => {
                warn!("Resource not found: {}", msg);
                "File not found".to_string()
            }
            ApplicationError::InvalidInput(ref msg) => {
                warn!("Invalid input: {}", msg);
                msg.clone()
            }
            ApplicationError::BadRequest(ref msg) => {
                warn!("Bad request: {}", msg);
                msg.clone()
            }
            ApplicationError::PayloadTooLarge { max } => {
                warn!("File too large");
                format!("File exceeds the maximum size of {} bytes", max)
            }
            ApplicationError::Cancelled => {
                warn!("Operation cancelled");
                "Operation cancelled".to_string()
            }
            ApplicationError::DeadlineExceeded => {
                warn!("Operation deadline exceeded");
                "Operation timed out".to_string()
            }
            ApplicationError::ReadFailure(ref msg) | ApplicationError::WriteFailure(ref msg) => {
                error!("Storage I/O error: {}", msg);
                "Storage error".to_string()
            }
            ApplicationError::Unavailable(ref msg) => {
                error!("Storage unavailable: {}", msg);
                "Storage unavailable".to_string()
            }
            ApplicationError::InternalError(ref msg) => {
                error!("Internal server error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_kind_has_its_own_code() {
        let errors = [
            ApplicationError::NotFound(String::new()),
            ApplicationError::InvalidInput(String::new()),
            ApplicationError::BadRequest(String::new()),
            ApplicationError::PayloadTooLarge { max: 1 },
            ApplicationError::ReadFailure(String::new()),
            ApplicationError::WriteFailure(String::new()),
            ApplicationError::Cancelled,
            ApplicationError::DeadlineExceeded,
            ApplicationError::Unavailable(String::new()),
            ApplicationError::InternalError(String::new()),
        ];

        let codes: HashSet<_> = errors.iter().map(|e| e.status_and_code().1).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ApplicationError::NotFound("get: file x not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn deadline_maps_to_504() {
        let response = ApplicationError::DeadlineExceeded.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
