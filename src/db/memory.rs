//! In-memory implementation of the repository traits.
//!
//! A unit of work locks the shared state, mutates a private copy and swaps it
//! back in on commit, so dropping an uncommitted unit leaves the store as it
//! was. Failure points can be armed to break a unit of work mid-sequence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    PullRequestRepository, ReviewerRepository, Store, TeamRepository, UnitOfWork, UserRepository,
};
use crate::errors::AppError;
use crate::models::{PrStatus, PullRequest, PullRequestShort, Team, TeamMember, User};

/// Operations that can be made to fail (or hang) once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// `add_reviewer` returns an internal error.
    AddReviewer,
    /// `deactivate_users` returns an internal error.
    DeactivateUsers,
    /// `add_reviewer` never completes.
    StallAddReviewer,
    /// `remove_reviewer` deletes nothing, as if a concurrent writer got there first.
    RemoveReviewerNoop,
}

#[derive(Debug, Clone)]
struct Assignment {
    pr_id: String,
    reviewer_id: String,
    assigned_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    /// Stored without reviewers; those live in `assignments`.
    pull_requests: BTreeMap<String, PullRequest>,
    assignments: Vec<Assignment>,
    next_seq: u64,
}

impl MemoryState {
    fn reviewers_of(&self, pr_id: &str) -> Vec<String> {
        let mut rows: Vec<&Assignment> =
            self.assignments.iter().filter(|a| a.pr_id == pr_id).collect();
        rows.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at).then(a.seq.cmp(&b.seq)));
        rows.into_iter().map(|a| a.reviewer_id.clone()).collect()
    }
}

/// In-memory store for tests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_point: Arc<std::sync::Mutex<Option<FailPoint>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure for the next matching operation.
    pub fn fail_on(&self, point: FailPoint) {
        *self.fail_point.lock().unwrap_or_else(|e| e.into_inner()) = Some(point);
    }
}

/// A unit of work over the in-memory state.
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_point: Arc<std::sync::Mutex<Option<FailPoint>>>,
}

impl MemoryUnitOfWork {
    /// Consume the armed failure point if it matches.
    fn tripped(&self, point: FailPoint) -> bool {
        let mut armed = self.fail_point.lock().unwrap_or_else(|e| e.into_inner());
        if *armed == Some(point) {
            *armed = None;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnitOfWork {
            guard,
            working,
            fail_point: self.fail_point.clone(),
        })
    }

    async fn begin_read(&self) -> Result<Self::Tx, AppError> {
        self.begin().await
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), AppError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[async_trait]
impl TeamRepository for MemoryUnitOfWork {
    async fn insert_team(&mut self, team_name: &str) -> Result<(), AppError> {
        if !self.working.teams.insert(team_name.to_string()) {
            return Err(AppError::TeamExists(team_name.to_string()));
        }
        Ok(())
    }

    async fn insert_member(
        &mut self,
        team_name: &str,
        member: &TeamMember,
    ) -> Result<(), AppError> {
        if !self.working.teams.contains(team_name) {
            return Err(AppError::Internal(format!("team {} does not exist", team_name)));
        }
        if self.working.users.contains_key(&member.user_id) {
            return Err(AppError::InvalidRequest(format!(
                "user {} already belongs to a team",
                member.user_id
            )));
        }
        self.working.users.insert(
            member.user_id.clone(),
            User {
                user_id: member.user_id.clone(),
                username: member.username.clone(),
                team_name: team_name.to_string(),
                is_active: member.is_active,
            },
        );
        Ok(())
    }

    async fn get_team(&mut self, team_name: &str) -> Result<Option<Team>, AppError> {
        if !self.working.teams.contains(team_name) {
            return Ok(None);
        }
        let mut members: Vec<TeamMember> = self
            .working
            .users
            .values()
            .filter(|u| u.team_name == team_name)
            .map(|u| TeamMember {
                user_id: u.user_id.clone(),
                username: u.username.clone(),
                is_active: u.is_active,
            })
            .collect();
        members.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }

    async fn delete_team(&mut self, team_name: &str) -> Result<bool, AppError> {
        if !self.working.teams.remove(team_name) {
            return Ok(false);
        }
        let removed_users: BTreeSet<String> = self
            .working
            .users
            .values()
            .filter(|u| u.team_name == team_name)
            .map(|u| u.user_id.clone())
            .collect();
        self.working.users.retain(|id, _| !removed_users.contains(id));
        self.working
            .pull_requests
            .retain(|_, pr| !removed_users.contains(&pr.author_id));
        let remaining_prs: BTreeSet<String> = self.working.pull_requests.keys().cloned().collect();
        self.working.assignments.retain(|a| {
            remaining_prs.contains(&a.pr_id) && !removed_users.contains(&a.reviewer_id)
        });
        Ok(true)
    }
}

#[async_trait]
impl UserRepository for MemoryUnitOfWork {
    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.working.users.get(user_id).cloned())
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<bool, AppError> {
        match self.working.users.get_mut(user_id) {
            Some(user) => {
                user.is_active = is_active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_users(
        &mut self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        if self.tripped(FailPoint::DeactivateUsers) {
            return Err(AppError::Internal("injected failure".into()));
        }
        let mut updated = Vec::new();
        for id in user_ids {
            if let Some(user) = self.working.users.get_mut(id) {
                if user.team_name == team_name {
                    user.is_active = false;
                    updated.push(id.clone());
                }
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl PullRequestRepository for MemoryUnitOfWork {
    async fn insert_pull_request(&mut self, pr: &PullRequest) -> Result<(), AppError> {
        if self.working.pull_requests.contains_key(&pr.pull_request_id) {
            return Err(AppError::PrExists(pr.pull_request_id.clone()));
        }
        if !self.working.users.contains_key(&pr.author_id) {
            return Err(AppError::Internal(format!("author {} does not exist", pr.author_id)));
        }
        let mut row = pr.clone();
        row.assigned_reviewers.clear();
        self.working.pull_requests.insert(pr.pull_request_id.clone(), row);
        Ok(())
    }

    async fn get_pull_request(&mut self, pr_id: &str) -> Result<Option<PullRequest>, AppError> {
        Ok(self.working.pull_requests.get(pr_id).map(|row| {
            let mut pr = row.clone();
            pr.assigned_reviewers = self.working.reviewers_of(pr_id);
            pr
        }))
    }

    async fn mark_merged(
        &mut self,
        pr_id: &str,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.working.pull_requests.get_mut(pr_id) {
            Some(pr) if pr.status == PrStatus::Open => {
                pr.status = PrStatus::Merged;
                pr.merged_at = Some(merged_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_need_more_reviewers(
        &mut self,
        pr_id: &str,
        value: bool,
    ) -> Result<bool, AppError> {
        match self.working.pull_requests.get_mut(pr_id) {
            Some(pr) => {
                pr.need_more_reviewers = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ReviewerRepository for MemoryUnitOfWork {
    async fn assigned_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self.working.reviewers_of(pr_id))
    }

    async fn add_reviewer(
        &mut self,
        pr_id: &str,
        reviewer_id: &str,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.tripped(FailPoint::AddReviewer) {
            return Err(AppError::Internal("injected failure".into()));
        }
        if self.tripped(FailPoint::StallAddReviewer) {
            std::future::pending::<()>().await;
        }
        if self
            .working
            .assignments
            .iter()
            .any(|a| a.pr_id == pr_id && a.reviewer_id == reviewer_id)
        {
            return Err(AppError::InvalidRequest(format!(
                "reviewer {} is already assigned to PR {}",
                reviewer_id, pr_id
            )));
        }
        let seq = self.working.next_seq;
        self.working.next_seq += 1;
        self.working.assignments.push(Assignment {
            pr_id: pr_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            assigned_at,
            seq,
        });
        Ok(())
    }

    async fn remove_reviewer(&mut self, pr_id: &str, reviewer_id: &str) -> Result<u64, AppError> {
        if self.tripped(FailPoint::RemoveReviewerNoop) {
            return Ok(0);
        }
        let before = self.working.assignments.len();
        self.working
            .assignments
            .retain(|a| !(a.pr_id == pr_id && a.reviewer_id == reviewer_id));
        Ok((before - self.working.assignments.len()) as u64)
    }

    async fn pull_requests_by_reviewer(
        &mut self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        let mut prs: Vec<&PullRequest> = self
            .working
            .assignments
            .iter()
            .filter(|a| a.reviewer_id == reviewer_id)
            .filter_map(|a| self.working.pull_requests.get(&a.pr_id))
            .collect();
        prs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.pull_request_id.cmp(&b.pull_request_id))
        });
        Ok(prs
            .into_iter()
            .map(|pr| PullRequestShort {
                pull_request_id: pr.pull_request_id.clone(),
                pull_request_name: pr.pull_request_name.clone(),
                author_id: pr.author_id.clone(),
                status: pr.status,
            })
            .collect())
    }

    async fn count_open_reviews(&mut self, reviewer_id: &str) -> Result<i64, AppError> {
        Ok(self
            .working
            .assignments
            .iter()
            .filter(|a| a.reviewer_id == reviewer_id)
            .filter(|a| {
                self.working
                    .pull_requests
                    .get(&a.pr_id)
                    .is_some_and(|pr| pr.status == PrStatus::Open)
            })
            .count() as i64)
    }
}
