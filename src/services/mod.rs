//! Business operations over the storage traits.
//!
//! Every mutating operation runs inside a single unit of work and is either
//! committed as a whole or rolled back as a whole. Reviewer load gauges are
//! refreshed after a successful commit.

mod deactivation;
mod pull_requests;
mod selector;
mod teams;
mod users;


use std::sync::Arc;

pub use pull_requests::PullRequestService;
pub use selector::{select_reviewers, CandidateSelector};
pub use teams::TeamService;
pub use users::UserService;

use crate::db::Store;
use crate::metrics::ReviewerLoad;

/// All services over one store.
pub struct Services<S: Store> {
    pub teams: TeamService<S>,
    pub users: UserService<S>,
    pub pull_requests: PullRequestService<S>,
}

impl<S: Store> Services<S> {
    pub fn new(store: Arc<S>, selector: Arc<CandidateSelector>, load: Arc<ReviewerLoad>) -> Self {
        Self {
            teams: TeamService::new(store.clone(), load.clone()),
            users: UserService::new(store.clone(), selector.clone(), load.clone()),
            pull_requests: PullRequestService::new(store, selector, load),
        }
    }
}
