//! Reconciliation of two replicas of the same learner record.
//!
//! Sets are unioned and counters take the maximum. The result is commutative,
//! idempotent, and never less informative than either input. `total_points` is
//! not derivable from `completed_lessons` (re-attempts add points), so summing
//! would double count while max never fabricates points.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{BadgeId, LessonId};

/// The mergeable subset of `UserProgress`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub completed_lessons: BTreeSet<LessonId>,
    pub total_points: u64,
    pub earned_badges: BTreeSet<BadgeId>,
    pub streak: u32,
}

#[must_use]
pub fn merge(local: &Snapshot, remote: &Snapshot) -> Snapshot {
    Snapshot {
        completed_lessons: local
            .completed_lessons
            .union(&remote.completed_lessons)
            .cloned()
            .collect(),
        total_points: local.total_points.max(remote.total_points),
        earned_badges: local
            .earned_badges
            .union(&remote.earned_badges)
            .cloned()
            .collect(),
        streak: local.streak.max(remote.streak),
    }
}

/// Merges when a remote replica exists; otherwise the local one is used as-is.
#[must_use]
pub fn reconcile(local: &Snapshot, remote: Option<&Snapshot>) -> Snapshot {
    match remote {
        Some(remote) => merge(local, remote),
        None => local.clone(),
    }
}
