//! Team directory operations.

use std::sync::Arc;

use tracing::info;

use crate::db::{Store, TeamRepository, UnitOfWork};
use crate::errors::AppError;
use crate::metrics::ReviewerLoad;
use crate::models::{Team, TeamMember};

pub struct TeamService<S: Store> {
    store: Arc<S>,
    load: Arc<ReviewerLoad>,
}

impl<S: Store> TeamService<S> {
    pub fn new(store: Arc<S>, load: Arc<ReviewerLoad>) -> Self {
        Self { store, load }
    }

    /// Create a team together with its initial members.
    #[tracing::instrument(skip(self, team), fields(team_name = %team.team_name, members = team.members.len()))]
    pub async fn create(&self, team: &Team) -> Result<Team, AppError> {
        let mut tx = self.store.begin().await?;
        tx.insert_team(&team.team_name).await?;
        for member in &team.members {
            tx.insert_member(&team.team_name, member).await?;
        }
        let created = tx
            .get_team(&team.team_name)
            .await?
            .ok_or_else(|| AppError::Internal(format!("team {} vanished", team.team_name)))?;
        tx.commit().await?;

        info!("Created team");
        Ok(created)
    }

    pub async fn get(&self, team_name: &str) -> Result<Team, AppError> {
        let mut tx = self.store.begin_read().await?;
        tx.get_team(team_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team {}", team_name)))
    }

    /// Add one member to an existing team.
    #[tracing::instrument(skip(self, member), fields(user_id = %member.user_id))]
    pub async fn add_member(&self, team_name: &str, member: &TeamMember) -> Result<Team, AppError> {
        let mut tx = self.store.begin().await?;
        if tx.get_team(team_name).await?.is_none() {
            return Err(AppError::NotFound(format!("team {}", team_name)));
        }
        tx.insert_member(team_name, member).await?;
        let team = tx
            .get_team(team_name)
            .await?
            .ok_or_else(|| AppError::Internal(format!("team {} vanished", team_name)))?;
        tx.commit().await?;

        info!("Added team member");
        Ok(team)
    }

    /// Delete a team with its users, their pull requests and assignments.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, team_name: &str) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let team = tx
            .get_team(team_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team {}", team_name)))?;
        if !tx.delete_team(team_name).await? {
            return Err(AppError::NotFound(format!("team {}", team_name)));
        }
        tx.commit().await?;

        let user_ids: Vec<String> = team.members.into_iter().map(|m| m.user_id).collect();
        self.load.forget(&user_ids).await;
        info!(users = user_ids.len(), "Deleted team");
        Ok(())
    }
}
