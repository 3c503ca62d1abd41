//! Pull request API endpoints.

use axum::extract::State;

use super::{created, ok, require, ApiResult, JsonBody, QueryParams};
use crate::models::{
    CreatePullRequestRequest, MergePullRequestRequest, PullRequestQuery, PullRequestResponse,
    ReassignReviewerRequest, ReassignReviewerResponse,
};
use crate::AppState;

/// POST /pullRequest/create - Open a pull request and assign reviewers.
pub async fn create_pull_request(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreatePullRequestRequest>,
) -> ApiResult<PullRequestResponse> {
    require("pull_request_id", &request.pull_request_id)?;
    require("pull_request_name", &request.pull_request_name)?;
    require("author_id", &request.author_id)?;

    let pr = state.services.pull_requests.create(&request).await?;
    created(PullRequestResponse { pr })
}

/// POST /pullRequest/merge - Merge a pull request (idempotent).
pub async fn merge_pull_request(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<MergePullRequestRequest>,
) -> ApiResult<PullRequestResponse> {
    require("pull_request_id", &request.pull_request_id)?;

    let pr = state
        .services
        .pull_requests
        .merge(&request.pull_request_id)
        .await?;
    ok(PullRequestResponse { pr })
}

/// GET /pullRequest/get - Get a pull request with its reviewers.
pub async fn get_pull_request(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PullRequestQuery>,
) -> ApiResult<PullRequestResponse> {
    require("pull_request_id", &query.pull_request_id)?;

    let pr = state
        .services
        .pull_requests
        .get(&query.pull_request_id)
        .await?;
    ok(PullRequestResponse { pr })
}

/// POST /pullRequest/reassign - Replace one reviewer.
pub async fn reassign_reviewer(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ReassignReviewerRequest>,
) -> ApiResult<ReassignReviewerResponse> {
    require("pull_request_id", &request.pull_request_id)?;
    require("old_user_id", &request.old_user_id)?;

    let (pr, replaced_by) = state
        .services
        .pull_requests
        .reassign(&request.pull_request_id, &request.old_user_id)
        .await?;
    ok(ReassignReviewerResponse { pr, replaced_by })
}
