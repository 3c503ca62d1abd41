//! Database module for SQLite persistence.
//!
//! Storage is exposed through capability traits (`TeamRepository`,
//! `UserRepository`, `PullRequestRepository`, `ReviewerRepository`) that are
//! implemented by a transaction handle. A [`Store`] opens such handles; nothing
//! written through a handle is visible to others until [`UnitOfWork::commit`],
//! and dropping an uncommitted handle rolls it back.

#[cfg(test)]
pub mod memory;
mod sqlite;

pub use sqlite::{SqliteStore, SqliteUnitOfWork};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{PullRequest, PullRequestShort, Team, TeamMember, User};

/// Team roster access.
#[async_trait]
pub trait TeamRepository {
    /// Insert a team row. Fails with `TeamExists` on a duplicate name.
    async fn insert_team(&mut self, team_name: &str) -> Result<(), AppError>;

    /// Insert a user into an existing team. Fails with `InvalidRequest` when
    /// the user id is already taken.
    async fn insert_member(&mut self, team_name: &str, member: &TeamMember)
        -> Result<(), AppError>;

    /// Load a team with its members ordered by username.
    async fn get_team(&mut self, team_name: &str) -> Result<Option<Team>, AppError>;

    /// Delete a team; users, their pull requests and assignments cascade.
    /// Returns false if the team did not exist.
    async fn delete_team(&mut self, team_name: &str) -> Result<bool, AppError>;
}

/// User directory access.
#[async_trait]
pub trait UserRepository {
    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Returns false if the user does not exist.
    async fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<bool, AppError>;

    /// Deactivate the given members of a team and report, in request order,
    /// the ids the store actually updated.
    async fn deactivate_users(
        &mut self,
        team_name: &str,
        user_ids: &[String],
    ) -> Result<Vec<String>, AppError>;
}

/// Pull request lifecycle rows.
#[async_trait]
pub trait PullRequestRepository {
    /// Insert the pull request row (reviewers are inserted separately).
    /// Fails with `PrExists` on a duplicate id.
    async fn insert_pull_request(&mut self, pr: &PullRequest) -> Result<(), AppError>;

    /// Load a pull request with its reviewers in assignment order.
    async fn get_pull_request(&mut self, pr_id: &str) -> Result<Option<PullRequest>, AppError>;

    /// Conditionally transition OPEN -> MERGED. Returns false when no OPEN
    /// row matched, leaving any existing `merged_at` untouched.
    async fn mark_merged(&mut self, pr_id: &str, merged_at: DateTime<Utc>)
        -> Result<bool, AppError>;

    /// Returns false if the pull request does not exist.
    async fn set_need_more_reviewers(&mut self, pr_id: &str, value: bool)
        -> Result<bool, AppError>;
}

/// The assignment relation between pull requests and reviewers.
#[async_trait]
pub trait ReviewerRepository {
    /// Reviewer ids ordered by assignment time.
    async fn assigned_reviewers(&mut self, pr_id: &str) -> Result<Vec<String>, AppError>;

    async fn add_reviewer(
        &mut self,
        pr_id: &str,
        reviewer_id: &str,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Returns the number of assignment rows deleted (0 or 1).
    async fn remove_reviewer(&mut self, pr_id: &str, reviewer_id: &str) -> Result<u64, AppError>;

    /// Pull requests the user reviews, newest first.
    async fn pull_requests_by_reviewer(
        &mut self,
        reviewer_id: &str,
    ) -> Result<Vec<PullRequestShort>, AppError>;

    /// Number of OPEN pull requests the user reviews.
    async fn count_open_reviews(&mut self, reviewer_id: &str) -> Result<i64, AppError>;
}

/// A transaction-scoped handle exposing every repository capability.
#[async_trait]
pub trait UnitOfWork:
    TeamRepository + UserRepository + PullRequestRepository + ReviewerRepository + Send
{
    /// Make every write performed through this handle visible atomically.
    async fn commit(self) -> Result<(), AppError>;
}

/// Source of units of work.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: UnitOfWork + 'static;

    /// Open a unit of work that intends to write. Writers are serialized.
    async fn begin(&self) -> Result<Self::Tx, AppError>;

    /// Open a unit of work for reads only.
    async fn begin_read(&self) -> Result<Self::Tx, AppError>;
}

/// Format a timestamp for storage. Fixed precision keeps text ordering
/// consistent with time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("invalid stored timestamp {:?}: {}", s, e)))
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            team_name TEXT NOT NULL REFERENCES teams(team_name) ON DELETE CASCADE,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pull_requests (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL CHECK (status IN ('OPEN', 'MERGED')),
            need_more_reviewers INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            merged_at TEXT,
            CHECK ((status = 'MERGED') = (merged_at IS NOT NULL))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviewers (
            pull_request_id TEXT NOT NULL REFERENCES pull_requests(id) ON DELETE CASCADE,
            reviewer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            assigned_at TEXT NOT NULL,
            PRIMARY KEY (pull_request_id, reviewer_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_users_team_name ON users(team_name);
        CREATE INDEX IF NOT EXISTS idx_pull_requests_author ON pull_requests(author_id);
        CREATE INDEX IF NOT EXISTS idx_pull_requests_status ON pull_requests(status);
        CREATE INDEX IF NOT EXISTS idx_reviewers_reviewer ON reviewers(reviewer_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
