//! REST API module.
//!
//! Contains all API routes and handlers. Request bodies and query strings are
//! decoded through extractors that reject with the common error envelope.

mod metrics;
mod pull_requests;
mod teams;
mod users;

pub use metrics::*;
pub use pull_requests::*;
pub use teams::*;
pub use users::*;

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::Json;

use crate::errors::AppError;

/// JSON body extractor whose rejection is an `INVALID_REQUEST` error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string extractor whose rejection is an `INVALID_REQUEST` error.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Result of a handler returning a JSON body with an explicit status.
pub type ApiResult<T> = Result<(StatusCode, Json<T>), AppError>;

/// Respond with 200 and a JSON body.
pub fn ok<T>(body: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(body)))
}

/// Respond with 201 and a JSON body.
pub fn created<T>(body: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(body)))
}

/// Reject blank required fields.
fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}
