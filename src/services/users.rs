//! User directory operations and bulk deactivation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::deactivation::{build_reassignment_plan, validate_deactivation, AffectedPullRequest};
use super::CandidateSelector;
use crate::db::{
    PullRequestRepository, ReviewerRepository, Store, TeamRepository, UnitOfWork, UserRepository,
};
use crate::errors::AppError;
use crate::metrics::ReviewerLoad;
use crate::models::{DeactivateTeamMembersResponse, PrStatus, PullRequestShort, User};

pub struct UserService<S: Store> {
    store: Arc<S>,
    selector: Arc<CandidateSelector>,
    load: Arc<ReviewerLoad>,
}

impl<S: Store> UserService<S> {
    pub fn new(store: Arc<S>, selector: Arc<CandidateSelector>, load: Arc<ReviewerLoad>) -> Self {
        Self {
            store,
            selector,
            load,
        }
    }

    /// Toggle a user's active flag. Existing assignments are left alone.
    #[tracing::instrument(skip(self))]
    pub async fn set_is_active(&self, user_id: &str, is_active: bool) -> Result<User, AppError> {
        let mut tx = self.store.begin().await?;
        if !tx.set_user_active(user_id, is_active).await? {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        let user = tx
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        tx.commit().await?;

        info!("Updated user activity");
        Ok(user)
    }

    /// Pull requests the user is assigned to review, newest first.
    pub async fn reviews(&self, user_id: &str) -> Result<Vec<PullRequestShort>, AppError> {
        let mut tx = self.store.begin_read().await?;
        if tx.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        tx.pull_requests_by_reviewer(user_id).await
    }

    /// Deactivate a subset of a team and move their open reviews to the
    /// remaining active members, all in one unit of work.
    #[tracing::instrument(skip(self, user_ids), fields(requested = user_ids.len()))]
    pub async fn deactivate_team_members(
        &self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<DeactivateTeamMembersResponse, AppError> {
        if user_ids.is_empty() {
            return Err(AppError::InvalidRequest(
                "cannot deactivate all team members without explicit user IDs".into(),
            ));
        }

        let mut seen = BTreeSet::new();
        let requested: Vec<String> = user_ids
            .iter()
            .filter(|id| seen.insert(id.to_string()))
            .cloned()
            .collect();

        let mut tx = self.store.begin().await?;

        let team = tx
            .get_team(team_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team {}", team_name)))?;
        validate_deactivation(&team, &requested)?;

        // Open pull requests reviewed by anyone being deactivated, by id.
        let mut affected: BTreeMap<String, PullRequestShort> = BTreeMap::new();
        for user_id in &requested {
            for pr in tx.pull_requests_by_reviewer(user_id).await? {
                if pr.status == PrStatus::Open {
                    affected.insert(pr.pull_request_id.clone(), pr);
                }
            }
        }

        let mut open_prs = Vec::with_capacity(affected.len());
        for (pr_id, pr) in affected {
            let reviewers = tx.assigned_reviewers(&pr_id).await?;
            open_prs.push(AffectedPullRequest {
                pr_id,
                author_id: pr.author_id,
                reviewers,
            });
        }

        let plan = self
            .selector
            .with_rng(|rng| build_reassignment_plan(&team, &requested, &open_prs, rng))?;

        let deactivated_user_ids = tx.deactivate_users(team_name, &requested).await?;

        let now = Utc::now();
        let mut short_handed = BTreeSet::new();
        for step in &plan {
            let removed = tx.remove_reviewer(&step.pr_id, &step.old_reviewer_id).await?;
            if removed == 0 {
                return Err(AppError::NotAssigned(format!(
                    "{} on PR {}",
                    step.old_reviewer_id, step.pr_id
                )));
            }
            match &step.new_reviewer_id {
                Some(new_id) => tx.add_reviewer(&step.pr_id, new_id, now).await?,
                None => {
                    short_handed.insert(step.pr_id.as_str());
                }
            }
        }
        for pr_id in &short_handed {
            tx.set_need_more_reviewers(pr_id, true).await?;
        }

        tx.commit().await?;

        if !short_handed.is_empty() {
            warn!(prs = short_handed.len(), "Pull requests left short of reviewers");
        }
        info!(
            deactivated = deactivated_user_ids.len(),
            reassignments = plan.len(),
            "Deactivated team members"
        );

        let mut touched: Vec<String> = deactivated_user_ids.clone();
        touched.extend(plan.iter().filter_map(|step| step.new_reviewer_id.clone()));
        self.load.refresh(self.store.as_ref(), &touched).await;

        Ok(DeactivateTeamMembersResponse {
            deactivated_user_ids,
            reassignments: plan,
        })
    }
}
