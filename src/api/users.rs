//! User API endpoints.

use axum::extract::State;

use super::{ok, require, ApiResult, JsonBody, QueryParams};
use crate::models::{
    DeactivateTeamMembersRequest, DeactivateTeamMembersResponse, SetIsActiveRequest,
    UserResponse, UserReviewsQuery, UserReviewsResponse,
};
use crate::AppState;

/// POST /users/setIsActive - Toggle a user's active flag.
pub async fn set_is_active(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SetIsActiveRequest>,
) -> ApiResult<UserResponse> {
    require("user_id", &request.user_id)?;

    let user = state
        .services
        .users
        .set_is_active(&request.user_id, request.is_active)
        .await?;
    ok(UserResponse { user })
}

/// GET /users/getReview - List pull requests a user reviews.
pub async fn get_user_reviews(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<UserReviewsQuery>,
) -> ApiResult<UserReviewsResponse> {
    require("user_id", &query.user_id)?;

    let pull_requests = state.services.users.reviews(&query.user_id).await?;
    ok(UserReviewsResponse {
        user_id: query.user_id,
        pull_requests,
    })
}

/// POST /users/deactivateTeamMembers - Deactivate members and move their reviews.
pub async fn deactivate_team_members(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DeactivateTeamMembersRequest>,
) -> ApiResult<DeactivateTeamMembersResponse> {
    require("team_name", &request.team_name)?;
    for user_id in &request.user_ids {
        require("user_ids entry", user_id)?;
    }

    let outcome = state
        .services
        .users
        .deactivate_team_members(&request.team_name, &request.user_ids)
        .await?;
    ok(outcome)
}
