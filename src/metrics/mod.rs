//! Reviewer load distribution telemetry.
//!
//! Tracks the number of OPEN pull requests each reviewer is assigned to and
//! renders it in the Prometheus text exposition format for `GET /metrics`.
//! Refreshes are best-effort: failures are logged and never reach callers.

use std::collections::BTreeMap;
use std::fmt::Write;

use tokio::sync::RwLock;

use crate::db::{ReviewerRepository, Store};

const METRIC_NAME: &str = "reviewer_load_distribution";

/// Per-reviewer open review counts.
#[derive(Default)]
pub struct ReviewerLoad {
    gauges: RwLock<BTreeMap<String, i64>>,
}

impl ReviewerLoad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the open review count of each reviewer from the store.
    ///
    /// The gauge write lock is held while reading, so concurrent refreshes
    /// apply in lock order and a later refresh always reads newer state.
    pub async fn refresh<S: Store>(&self, store: &S, reviewer_ids: &[String]) {
        if reviewer_ids.is_empty() {
            return;
        }

        let mut gauges = self.gauges.write().await;

        let mut tx = match store.begin_read().await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!("Failed to refresh reviewer load: {}", e);
                return;
            }
        };

        for reviewer_id in reviewer_ids {
            match tx.count_open_reviews(reviewer_id).await {
                Ok(count) => {
                    gauges.insert(reviewer_id.clone(), count);
                }
                Err(e) => {
                    tracing::warn!(reviewer_id = %reviewer_id, "Failed to refresh reviewer load: {}", e);
                }
            }
        }
    }

    /// Drop gauges of users that no longer exist.
    pub async fn forget(&self, user_ids: &[String]) {
        let mut gauges = self.gauges.write().await;
        for id in user_ids {
            gauges.remove(id);
        }
    }

    #[cfg(test)]
    pub async fn get(&self, reviewer_id: &str) -> Option<i64> {
        self.gauges.read().await.get(reviewer_id).copied()
    }

    /// Render all gauges in the text exposition format.
    pub async fn render(&self) -> String {
        let gauges = self.gauges.read().await;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# HELP {} Number of open pull requests assigned to each reviewer.",
            METRIC_NAME
        );
        let _ = writeln!(out, "# TYPE {} gauge", METRIC_NAME);
        for (reviewer_id, count) in gauges.iter() {
            let _ = writeln!(
                out,
                "{}{{reviewer_id=\"{}\"}} {}",
                METRIC_NAME,
                escape_label(reviewer_id),
                count
            );
        }
        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
