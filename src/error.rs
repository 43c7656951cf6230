use std::time::Duration;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::race::RaceError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Identity is missing or not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Message sent back to a WebSocket client, without the category prefix.
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::Unauthorized(message)
            | ServiceError::InvalidInput(message)
            | ServiceError::InvalidState(message)
            | ServiceError::NotFound(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<RaceError> for ServiceError {
    fn from(err: RaceError) -> Self {
        match err {
            RaceError::RaceNotFound(_) => ServiceError::NotFound(err.to_string()),
            err if err.is_validation() => ServiceError::InvalidInput(err.to_string()),
            err => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::Timeout(_) => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_errors_split_into_input_state_and_missing() {
        assert!(matches!(
            ServiceError::from(RaceError::EmptyComment),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            ServiceError::from(RaceError::NotOpen),
            ServiceError::InvalidState(_)
        ));
        assert!(matches!(
            ServiceError::from(RaceError::RaceNotFound(3)),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn client_message_drops_the_category_prefix() {
        let err = ServiceError::from(RaceError::NotCaptain);
        assert_eq!(err.client_message(), "only the captain can do this");
        assert_eq!(
            AppError::from(err).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn timeouts_surface_as_unavailable() {
        let err = ServiceError::Timeout(Duration::from_millis(20));
        assert_eq!(err.client_message(), "operation timed out after 20ms");
        assert_eq!(
            AppError::from(err).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
