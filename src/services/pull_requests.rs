//! Pull request lifecycle and reviewer reassignment.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::CandidateSelector;
use crate::db::{
    PullRequestRepository, ReviewerRepository, Store, TeamRepository, UnitOfWork, UserRepository,
};
use crate::errors::AppError;
use crate::metrics::ReviewerLoad;
use crate::models::{CreatePullRequestRequest, PrStatus, PullRequest, TeamMember, MAX_REVIEWERS_COUNT};

pub struct PullRequestService<S: Store> {
    store: Arc<S>,
    selector: Arc<CandidateSelector>,
    load: Arc<ReviewerLoad>,
}

fn pr_not_found(pr_id: &str) -> AppError {
    AppError::NotFound(format!("PR {}", pr_id))
}

fn not_assigned(pr_id: &str, reviewer_id: &str) -> AppError {
    AppError::NotAssigned(format!("{} on PR {}", reviewer_id, pr_id))
}

impl<S: Store> PullRequestService<S> {
    pub fn new(store: Arc<S>, selector: Arc<CandidateSelector>, load: Arc<ReviewerLoad>) -> Self {
        Self {
            store,
            selector,
            load,
        }
    }

    /// Open a pull request and assign up to two reviewers from the author's team.
    #[tracing::instrument(
        skip(self, request),
        fields(pr_id = %request.pull_request_id, author_id = %request.author_id)
    )]
    pub async fn create(&self, request: &CreatePullRequestRequest) -> Result<PullRequest, AppError> {
        let mut tx = self.store.begin().await?;

        if tx.get_pull_request(&request.pull_request_id).await?.is_some() {
            return Err(AppError::PrExists(request.pull_request_id.clone()));
        }

        let author = tx
            .get_user(&request.author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("author {}", request.author_id)))?;
        let team = tx
            .get_team(&author.team_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("team {}", author.team_name)))?;

        let reviewers = self
            .selector
            .select(&team.members, &author.user_id, MAX_REVIEWERS_COUNT);

        let now = Utc::now();
        let pr = PullRequest {
            pull_request_id: request.pull_request_id.clone(),
            pull_request_name: request.pull_request_name.clone(),
            author_id: author.user_id,
            status: PrStatus::Open,
            need_more_reviewers: reviewers.len() < MAX_REVIEWERS_COUNT,
            assigned_reviewers: reviewers,
            created_at: now,
            merged_at: None,
        };

        tx.insert_pull_request(&pr).await?;
        for reviewer_id in &pr.assigned_reviewers {
            tx.add_reviewer(&pr.pull_request_id, reviewer_id, now).await?;
        }
        // Return the stored row so timestamps carry the stored precision.
        let created = tx
            .get_pull_request(&pr.pull_request_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("PR {} vanished", pr.pull_request_id)))?;
        tx.commit().await?;

        info!(
            reviewers = created.assigned_reviewers.len(),
            need_more_reviewers = created.need_more_reviewers,
            "Created pull request"
        );
        self.load.refresh(self.store.as_ref(), &created.assigned_reviewers).await;
        Ok(created)
    }

    /// Mark a pull request merged. Merging a merged pull request returns it
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn merge(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut tx = self.store.begin().await?;
        let merged_now = tx.mark_merged(pr_id, Utc::now()).await?;
        let pr = tx
            .get_pull_request(pr_id)
            .await?
            .ok_or_else(|| pr_not_found(pr_id))?;
        tx.commit().await?;

        if merged_now {
            info!("Merged pull request");
            self.load.refresh(self.store.as_ref(), &pr.assigned_reviewers).await;
        }
        Ok(pr)
    }

    pub async fn get(&self, pr_id: &str) -> Result<PullRequest, AppError> {
        let mut tx = self.store.begin_read().await?;
        tx.get_pull_request(pr_id)
            .await?
            .ok_or_else(|| pr_not_found(pr_id))
    }

    /// Replace one reviewer of an open pull request with a random active
    /// member of the old reviewer's team.
    ///
    /// When nobody qualifies the pull request is flagged as needing more
    /// reviewers, that flag is committed, and `NoCandidate` is returned.
    #[tracing::instrument(skip(self))]
    pub async fn reassign(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<(PullRequest, String), AppError> {
        let mut tx = self.store.begin().await?;

        let pr = tx
            .get_pull_request(pr_id)
            .await?
            .ok_or_else(|| pr_not_found(pr_id))?;
        if pr.is_merged() {
            return Err(AppError::PrMerged(pr_id.to_string()));
        }
        if !pr.assigned_reviewers.iter().any(|r| r == old_reviewer_id) {
            return Err(not_assigned(pr_id, old_reviewer_id));
        }

        let old_reviewer = tx
            .get_user(old_reviewer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", old_reviewer_id)))?;
        let team = tx
            .get_team(&old_reviewer.team_name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("team {}", old_reviewer.team_name))
            })?;

        let pool: Vec<TeamMember> = team
            .members
            .into_iter()
            .filter(|m| !pr.assigned_reviewers.contains(&m.user_id))
            .collect();
        let picked = self.selector.select(&pool, &pr.author_id, 1);

        let Some(new_reviewer_id) = picked.into_iter().next() else {
            tx.set_need_more_reviewers(pr_id, true).await?;
            tx.commit().await?;
            warn!("No replacement candidate, pull request flagged");
            return Err(AppError::NoCandidate(format!("team {}", old_reviewer.team_name)));
        };

        if tx.remove_reviewer(pr_id, old_reviewer_id).await? == 0 {
            return Err(not_assigned(pr_id, old_reviewer_id));
        }
        tx.add_reviewer(pr_id, &new_reviewer_id, Utc::now()).await?;

        let updated = tx
            .get_pull_request(pr_id)
            .await?
            .ok_or_else(|| pr_not_found(pr_id))?;
        tx.commit().await?;

        info!(new_reviewer_id = %new_reviewer_id, "Reassigned reviewer");
        self.load
            .refresh(
                self.store.as_ref(),
                &[old_reviewer_id.to_string(), new_reviewer_id.clone()],
            )
            .await;
        Ok((updated, new_reviewer_id))
    }
}
