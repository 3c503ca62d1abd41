//! User models.

use serde::{Deserialize, Serialize};

use super::PullRequestShort;

/// A user with its team membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

/// Request body for `POST /users/setIsActive`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

/// Response body wrapping a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// Query for `GET /users/getReview`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserReviewsQuery {
    pub user_id: String,
}

/// Pull requests a user is assigned to review.
#[derive(Debug, Clone, Serialize)]
pub struct UserReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShort>,
}
