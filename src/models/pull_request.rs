//! Pull request models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pull request. MERGED is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PrStatus::Open),
            "MERGED" => Some(PrStatus::Merged),
            _ => None,
        }
    }
}

/// A pull request with its current reviewer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
    /// Ordered by assignment time
    pub assigned_reviewers: Vec<String>,
    pub need_more_reviewers: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }
}

/// Compact pull request listing used for reviewer queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PrStatus,
}

/// One unit of a reassignment plan. `new_reviewer_id` is `None` when the old
/// reviewer is removed without a successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerReassignment {
    pub pr_id: String,
    pub old_reviewer_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_reviewer_id: Option<String>,
}

/// Request body for `POST /pullRequest/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Request body for `POST /pullRequest/merge`.
#[derive(Debug, Clone, Deserialize)]
pub struct MergePullRequestRequest {
    pub pull_request_id: String,
}

/// Query for `GET /pullRequest/get`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestQuery {
    pub pull_request_id: String,
}

/// Request body for `POST /pullRequest/reassign`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReassignReviewerRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

/// Response body wrapping a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestResponse {
    pub pr: PullRequest,
}

/// Response body for a successful reassignment.
#[derive(Debug, Clone, Serialize)]
pub struct ReassignReviewerResponse {
    pub pr: PullRequest,
    pub replaced_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_storage_text() {
        for status in [PrStatus::Open, PrStatus::Merged] {
            assert_eq!(PrStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PrStatus::parse("CLOSED"), None);
    }

    #[test]
    fn test_reassignment_without_successor_omits_field() {
        let removal = ReviewerReassignment {
            pr_id: "pr-1".into(),
            old_reviewer_id: "u2".into(),
            new_reviewer_id: None,
        };
        let json = serde_json::to_value(&removal).unwrap();
        assert!(json.get("new_reviewer_id").is_none());
    }
}
