//! Metrics endpoint.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::AppState;

/// GET /metrics - Reviewer load in the Prometheus text format.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.load.render().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
