//! SQLite implementation of the repository traits.
//!
//! Every unit of work wraps one sqlx transaction. Writing units additionally
//! hold the store's write lock for their whole lifetime, so read-then-write
//! sequences on the same rows never interleave.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    format_timestamp, parse_timestamp, PullRequestRepository, ReviewerRepository, Store,
    TeamRepository, UnitOfWork, UserRepository,
};
use crate::errors::{is_unique_violation, AppError};
use crate::models::{PrStatus, PullRequest, PullRequestShort, Team, TeamMember, User};

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// A transaction over the SQLite pool.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
    _write_guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl Store for SqliteStore {
    type Tx = SqliteUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, AppError> {
        let guard = self.write_lock.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(SqliteUnitOfWork {
            tx,
            _write_guard: Some(guard),
        })
    }

    async fn begin_read(&self) -> Result<Self::Tx, AppError> {
        let tx = self.pool.begin().await?;
        Ok(SqliteUnitOfWork {
            tx,
            _write_guard: None,
        })
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ==================== TEAM OPERATIONS ====================

#[async_trait]
impl TeamRepository for SqliteUnitOfWork {
    async fn insert_team(&mut self, team_name: &str) -> Result<(), AppError> {
        let now = format_timestamp(&Utc::now());
        sqlx::query("INSERT INTO teams (team_name, created_at) VALUES (?, ?)")
            .bind(team_name)
            .bind(&now)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::TeamExists(team_name.to_string())
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    async fn insert_member(
        &mut self,
        team_name: &str,
        member: &TeamMember,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO users (id, username, team_name, is_active) VALUES (?, ?, ?, ?)")
            .bind(&member.user_id)
            .bind(&member.username)
            .bind(team_name)
            .bind(member.is_active as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::InvalidRequest(format!(
                        "user {} already belongs to a team",
                        member.user_id
                    ))
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    async fn get_team(&mut self, team_name: &str) -> Result<Option<Team>, AppError> {
        let exists = sqlx::query("SELECT team_name FROM teams WHERE team_name = ?")
            .bind(team_name)
            .fetch_optional(&mut *self.tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT id, username, is_active FROM users WHERE team_name = ? ORDER BY username, id",
        )
        .bind(team_name)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(Team {
            team_name: team_name.to_string(),
            members: rows.iter().map(member_from_row).collect(),
        }))
    }

    async fn delete_team(&mut self, team_name: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM teams WHERE team_name = ?")
            .bind(team_name)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ==================== USER OPERATIONS ====================

#[async_trait]
impl UserRepository for SqliteUnitOfWork {
    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query("SELECT id, username, team_name, is_active FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(is_active as i32)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate_users(
        &mut self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<Vec<String>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE users SET is_active = 0 WHERE team_name = ");
        builder.push_bind(team_name);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in user_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") RETURNING id");

        let rows = builder.build().fetch_all(&mut *self.tx).await?;
        let updated: Vec<String> = rows.iter().map(|row| row.get("id")).collect();

        Ok(user_ids
            .iter()
            .filter(|id| updated.contains(id))
            .cloned()
            .collect())
    }
}

// ==================== PULL REQUEST OPERATIONS ====================

#[async_trait]
impl PullRequestRepository for SqliteUnitOfWork {
    async fn insert_pull_request(&mut self, pr: &PullRequest) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO pull_requests (id, name, author_id, status, need_more_reviewers, created_at, merged_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&pr.pull_request_id)
        .bind(&pr.pull_request_name)
        .bind(&pr.author_id)
        .bind(pr.status.as_str())
        .bind(pr.need_more_reviewers as i32)
        .bind(format_timestamp(&pr.created_at))
        .bind(pr.merged_at.as_ref().map(format_timestamp))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::PrExists(pr.pull_request_id.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_pull_request(&mut self, pr_id: &str) -> Result<Option<PullRequest>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, author_id, status, need_more_reviewers, created_at, merged_at FROM pull_requests WHERE id = ?"
        )
        .bind(pr_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reviewers = self.assigned_reviewers(pr_id).await?;
        pull_request_from_row(&row, reviewers).map(Some)
    }

    async fn mark_merged(
        &mut self,
        pr_id: &str,
        merged_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE pull_requests SET status = 'MERGED', merged_at = ? WHERE id = ? AND status = 'OPEN'",
        )
        .bind(format_timestamp(&merged_at))
        .bind(pr_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_need_more_reviewers(
        &mut self,
        pr_id: &str,
        value: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE pull_requests SET need_more_reviewers = ? WHERE id = ?")
            .bind(value as i32)
            .bind(pr_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ==================== REVIEWER OPERATIONS ====================

#[async_trait]
impl ReviewerRepository for SqliteUnitOfWork {
    async fn assigned_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT reviewer_id FROM reviewers WHERE pull_request_id = ? ORDER BY assigned_at, rowid",
        )
        .bind(pr_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.iter().map(|row| row.get("reviewer_id")).collect())
    }

    async fn add_reviewer(
        &mut self,
        pr_id: &str,
        reviewer_id: &str,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO reviewers (pull_request_id, reviewer_id, assigned_at) VALUES (?, ?, ?)",
        )
        .bind(pr_id)
        .bind(reviewer_id)
        .bind(format_timestamp(&assigned_at))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::InvalidRequest(format!(
                    "reviewer {} is already assigned to PR {}",
                    reviewer_id, pr_id
                ))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn remove_reviewer(&mut self, pr_id: &str, reviewer_id: &str) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM reviewers WHERE pull_request_id = ? AND reviewer_id = ?")
                .bind(pr_id)
                .bind(reviewer_id)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn pull_requests_by_reviewer(
        &mut self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError> {
        let rows = sqlx::query(
            r#"SELECT pr.id, pr.name, pr.author_id, pr.status
               FROM pull_requests pr
               JOIN reviewers r ON pr.id = r.pull_request_id
               WHERE r.reviewer_id = ?
               ORDER BY pr.created_at DESC, pr.id"#,
        )
        .bind(reviewer_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(short_from_row).collect()
    }

    async fn count_open_reviews(&mut self, reviewer_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS open_reviews
               FROM reviewers r
               JOIN pull_requests pr ON pr.id = r.pull_request_id
               WHERE r.reviewer_id = ? AND pr.status = 'OPEN'"#,
        )
        .bind(reviewer_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get("open_reviews"))
    }
}

// Helper functions for row conversion

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> TeamMember {
    let is_active: i32 = row.get("is_active");
    TeamMember {
        user_id: row.get("id"),
        username: row.get("username"),
        is_active: is_active != 0,
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let is_active: i32 = row.get("is_active");
    User {
        user_id: row.get("id"),
        username: row.get("username"),
        team_name: row.get("team_name"),
        is_active: is_active != 0,
    }
}

fn parse_status(raw: &str) -> Result<PrStatus, AppError> {
    PrStatus::parse(raw).ok_or_else(|| AppError::Internal(format!("unknown PR status {:?}", raw)))
}

fn pull_request_from_row(
    row: &sqlx::sqlite::SqliteRow,
    assigned_reviewers: Vec<String>,
) -> Result<PullRequest, AppError> {
    let status: String = row.get("status");
    let need_more_reviewers: i32 = row.get("need_more_reviewers");
    let created_at: String = row.get("created_at");
    let merged_at: Option<String> = row.get("merged_at");

    Ok(PullRequest {
        pull_request_id: row.get("id"),
        pull_request_name: row.get("name"),
        author_id: row.get("author_id"),
        status: parse_status(&status)?,
        assigned_reviewers,
        need_more_reviewers: need_more_reviewers != 0,
        created_at: parse_timestamp(&created_at)?,
        merged_at: merged_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn short_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PullRequestShort, AppError> {
    let status: String = row.get("status");
    Ok(PullRequestShort {
        pull_request_id: row.get("id"),
        pull_request_name: row.get("name"),
        author_id: row.get("author_id"),
        status: parse_status(&status)?,
    })
}
