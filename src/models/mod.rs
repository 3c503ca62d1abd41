//! Data models for the review assignment service.
//!
//! Field names follow the public JSON contract (snake_case, with the two
//! camelCase timestamps on pull requests).

mod pull_request;
mod team;
mod user;

pub use pull_request::*;
pub use team::*;
pub use user::*;

/// Number of reviewers assigned to every new pull request.
pub const MAX_REVIEWERS_COUNT: usize = 2;
