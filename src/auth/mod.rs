//! Authorization header check.
//!
//! Every protected request must carry an `Authorization` header. When a token
//! is configured the header must also match it, either as `Bearer <token>` or
//! as the bare token, compared in constant time.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, ErrorResponse};

/// Authorization middleware that takes the expected token as a parameter.
pub async fn auth_layer(expected_token: Option<String>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    match check_authorization(provided, expected_token.as_deref()) {
        Ok(()) => next.run(request).await,
        Err(message) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request: {}", message);
            unauthorized_response(message)
        }
    }
}

/// Decide whether a request's Authorization header is acceptable.
fn check_authorization(provided: Option<&str>, expected: Option<&str>) -> Result<(), &'static str> {
    let Some(provided) = provided.map(str::trim).filter(|v| !v.is_empty()) else {
        return Err("missing Authorization header");
    };

    let Some(expected) = expected else {
        return Ok(());
    };

    let token = provided.strip_prefix("Bearer ").unwrap_or(provided);
    if constant_time_compare(token, expected) {
        Ok(())
    } else {
        Err("invalid Authorization token")
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse::new(codes::INVALID_REQUEST, message);
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
