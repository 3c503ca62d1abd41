//! Error handling module for the review assignment service.
//!
//! Provides the closed set of domain errors with mapping to HTTP status codes and
//! the `{"error": {"code", "message"}}` response envelope.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const TEAM_EXISTS: &str = "TEAM_EXISTS";
    pub const PR_EXISTS: &str = "PR_EXISTS";
    pub const PR_MERGED: &str = "PR_MERGED";
    pub const NOT_ASSIGNED: &str = "NOT_ASSIGNED";
    pub const NO_CANDIDATE: &str = "NO_CANDIDATE";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Message returned to callers for any internal failure.
const INTERNAL_MESSAGE: &str = "internal server error";

/// Application error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed or semantically inadmissible input
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Team name already taken
    #[error("team_name already exists: {0}")]
    TeamExists(String),
    /// Pull request id already taken
    #[error("PR id already exists: {0}")]
    PrExists(String),
    /// Mutation attempted on a merged pull request
    #[error("cannot reassign on merged PR: {0}")]
    PrMerged(String),
    /// Reviewer is not assigned to the pull request
    #[error("reviewer is not assigned to this PR: {0}")]
    NotAssigned(String),
    /// No eligible replacement reviewer
    #[error("no active replacement candidate: {0}")]
    NoCandidate(String),
    /// Resource not found
    #[error("resource not found: {0}")]
    NotFound(String),
    /// Storage or encoding failure; details are logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TeamExists(_) => StatusCode::BAD_REQUEST,
            AppError::PrExists(_) => StatusCode::CONFLICT,
            AppError::PrMerged(_) => StatusCode::CONFLICT,
            AppError::NotAssigned(_) => StatusCode::CONFLICT,
            AppError::NoCandidate(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => codes::INVALID_REQUEST,
            AppError::TeamExists(_) => codes::TEAM_EXISTS,
            AppError::PrExists(_) => codes::PR_EXISTS,
            AppError::PrMerged(_) => codes::PR_MERGED,
            AppError::NotAssigned(_) => codes::NOT_ASSIGNED,
            AppError::NoCandidate(_) => codes::NO_CANDIDATE,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the message exposed to the caller.
    pub fn message(&self) -> String {
        match self {
            AppError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Internal(format!("Database error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(format!("failed to decode JSON: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(format!("query parameter is required: {}", rejection.body_text()))
    }
}

/// Returns true when a sqlx error is a uniqueness or primary-key violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        ErrorResponse::new(error.error_code(), error.message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Internal(detail) => {
                tracing::error!(status = status.as_u16(), code = self.error_code(), %detail, "request failed")
            }
            _ => tracing::warn!(status = status.as_u16(), code = self.error_code(), error = %self, "request rejected"),
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::TeamExists("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PrExists("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NoCandidate("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_opaque() {
        let err = AppError::Internal("connection refused at /var/db".into());
        assert_eq!(err.message(), "internal server error");
        assert_eq!(err.error_code(), codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = ErrorResponse::from(&AppError::PrMerged("pr-1".into()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "PR_MERGED");
        assert!(json["error"]["message"].as_str().unwrap().contains("pr-1"));
    }
}
