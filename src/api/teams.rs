//! Team API endpoints.

use std::collections::HashSet;

use axum::extract::State;

use super::{created, ok, require, ApiResult, JsonBody, QueryParams};
use crate::errors::AppError;
use crate::models::{
    AddTeamMemberRequest, DeleteTeamRequest, DeleteTeamResponse, Team, TeamMember, TeamQuery,
    TeamResponse,
};
use crate::AppState;

/// POST /team/add - Create a team with its members.
pub async fn add_team(
    State(state): State<AppState>,
    JsonBody(team): JsonBody<Team>,
) -> ApiResult<TeamResponse> {
    validate_team(&team)?;

    let team = state.services.teams.create(&team).await?;
    created(TeamResponse { team })
}

/// GET /team/get - Get a team with its members.
pub async fn get_team(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TeamQuery>,
) -> ApiResult<Team> {
    require("team_name", &query.team_name)?;

    let team = state.services.teams.get(&query.team_name).await?;
    ok(team)
}

/// POST /team/addMember - Add a member to an existing team.
pub async fn add_team_member(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AddTeamMemberRequest>,
) -> ApiResult<TeamResponse> {
    require("team_name", &request.team_name)?;
    validate_member(&request.member)?;

    let team = state
        .services
        .teams
        .add_member(&request.team_name, &request.member)
        .await?;
    created(TeamResponse { team })
}

/// POST /team/delete - Delete a team and everything it owns.
pub async fn delete_team(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DeleteTeamRequest>,
) -> ApiResult<DeleteTeamResponse> {
    require("team_name", &request.team_name)?;

    state.services.teams.delete(&request.team_name).await?;
    ok(DeleteTeamResponse {
        team_name: request.team_name,
    })
}

fn validate_team(team: &Team) -> Result<(), AppError> {
    require("team_name", &team.team_name)?;
    if team.members.is_empty() {
        return Err(AppError::InvalidRequest(
            "team must have at least one member".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for member in &team.members {
        validate_member(member)?;
        if !seen.insert(member.user_id.as_str()) {
            return Err(AppError::InvalidRequest(format!(
                "duplicate member {}",
                member.user_id
            )));
        }
    }
    Ok(())
}

fn validate_member(member: &TeamMember) -> Result<(), AppError> {
    require("user_id", &member.user_id)?;
    require("username", &member.username)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, name: &str) -> TeamMember {
        TeamMember {
            user_id: id.to_string(),
            username: name.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_validate_team() {
        let good = Team {
            team_name: "backend".into(),
            members: vec![member("u1", "Alice"), member("u2", "Bob")],
        };
        assert!(validate_team(&good).is_ok());

        let empty = Team {
            team_name: "backend".into(),
            members: vec![],
        };
        assert!(validate_team(&empty).is_err());

        let nameless = Team {
            team_name: "backend".into(),
            members: vec![member("u1", "")],
        };
        assert_eq!(
            validate_team(&nameless),
            Err(AppError::InvalidRequest("username is required".into()))
        );

        let dup = Team {
            team_name: "backend".into(),
            members: vec![member("u1", "Alice"), member("u1", "Alicia")],
        };
        assert_eq!(
            validate_team(&dup),
            Err(AppError::InvalidRequest("duplicate member u1".into()))
        );
    }
}
