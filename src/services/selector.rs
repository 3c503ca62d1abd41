//! Random reviewer selection.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::models::TeamMember;

/// Pick up to `count` distinct active members other than `exclude_user_id`.
///
/// When there are no more eligible members than `count`, all of them are
/// returned. Otherwise the result is a uniform sample without replacement.
/// Callers must not rely on the order of the returned ids.
pub fn select_reviewers<R: Rng + ?Sized>(
    members: &[TeamMember],
    exclude_user_id: &str,
    count: usize,
    rng: &mut R,
) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<String> = members
        .iter()
        .filter(|m| m.is_active && m.user_id != exclude_user_id)
        .map(|m| m.user_id.clone())
        .collect();

    if candidates.len() <= count {
        return candidates;
    }

    candidates.shuffle(rng);
    candidates.truncate(count);
    candidates
}

/// Owns the random source used for every reviewer selection.
pub struct CandidateSelector {
    rng: Mutex<StdRng>,
}

impl CandidateSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selector, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn select(&self, members: &[TeamMember], exclude_user_id: &str, count: usize) -> Vec<String> {
        self.with_rng(|rng| select_reviewers(members, exclude_user_id, count, rng))
    }

    /// Run `f` with exclusive access to the random source.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}
