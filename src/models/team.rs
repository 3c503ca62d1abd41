//! Team and roster models.

use serde::{Deserialize, Serialize};

use super::ReviewerReassignment;

/// A member of a team as seen in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A team with its members ordered by username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

impl Team {
    /// Whether the given user belongs to this team.
    pub fn has_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }
}

/// Response body wrapping a team.
#[derive(Debug, Clone, Serialize)]
pub struct TeamResponse {
    pub team: Team,
}

/// Query for `GET /team/get`.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

/// Request body for adding one member to an existing team.
#[derive(Debug, Clone, Deserialize)]
pub struct AddTeamMemberRequest {
    pub team_name: String,
    pub member: TeamMember,
}

/// Request body for deleting a team.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteTeamRequest {
    pub team_name: String,
}

/// Response body for a deleted team.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteTeamResponse {
    pub team_name: String,
}

/// Request body for bulk deactivation of team members.
#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateTeamMembersRequest {
    pub team_name: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// Outcome of a bulk deactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeactivateTeamMembersResponse {
    pub deactivated_user_ids: Vec<String>,
    pub reassignments: Vec<ReviewerReassignment>,
}
