use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use storage::repository::{RemoteCounterField, RemoteSetField, RemoteStore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tutor_core::Snapshot;
use tutor_core::model::UserId;

/// Cloneable read-only view of whether remote work is in flight.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    in_flight: Arc<AtomicUsize>,
}

impl SyncStatus {
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }
}

/// Marks one unit of remote work; the count drops when the guard does,
/// whether the work succeeded, failed, or panicked.
pub(crate) struct SyncGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Tracks detached remote pushes.
///
/// Dropping the tracker detaches the tasks rather than aborting them, so a
/// push can still land after its manager is gone.
#[derive(Default)]
pub(crate) struct SyncTracker {
    status: SyncStatus,
    pending: Vec<JoinHandle<()>>,
}

impl SyncTracker {
    pub(crate) fn status(&self) -> SyncStatus {
        self.status.clone()
    }

    pub(crate) fn begin(&self) -> SyncGuard {
        self.status.in_flight.fetch_add(1, Ordering::AcqRel);
        SyncGuard {
            in_flight: Arc::clone(&self.status.in_flight),
        }
    }

    pub(crate) fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.begin();
        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(tokio::spawn(async move {
            let _guard = guard;
            work.await;
        }));
    }

    pub(crate) async fn drain(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "remote push task did not complete");
            }
        }
    }
}

/// A single commutative remote mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RemoteOp {
    Append(RemoteSetField, String),
    Increment(RemoteCounterField, i64),
}

/// Commutative operations that move a remote replica from `before` to `after`.
///
/// Set growth becomes appends; counter changes become increments. Points
/// only ever grow locally, so only positive point deltas are pushed.
pub(crate) fn diff_ops(before: &Snapshot, after: &Snapshot) -> Vec<RemoteOp> {
    let mut ops: Vec<RemoteOp> = after
        .completed_lessons
        .difference(&before.completed_lessons)
        .map(|id| RemoteOp::Append(RemoteSetField::CompletedLessons, id.to_string()))
        .collect();
    ops.extend(
        after
            .earned_badges
            .difference(&before.earned_badges)
            .map(|id| RemoteOp::Append(RemoteSetField::EarnedBadges, id.to_string())),
    );

    if after.total_points > before.total_points {
        let delta = i64::try_from(after.total_points - before.total_points).unwrap_or(i64::MAX);
        ops.push(RemoteOp::Increment(RemoteCounterField::TotalPoints, delta));
    }

    let streak_delta = i64::from(after.streak) - i64::from(before.streak);
    if streak_delta != 0 {
        ops.push(RemoteOp::Increment(RemoteCounterField::Streak, streak_delta));
    }
    ops
}

/// Applies `ops` in order, stopping at the first failure. Failures are only
/// logged; nothing is retried.
pub(crate) async fn push_ops(remote: Arc<dyn RemoteStore>, user: UserId, ops: Vec<RemoteOp>) {
    let count = ops.len();
    for op in ops {
        let result = match &op {
            RemoteOp::Append(field, value) => remote.append_to_set(&user, *field, value).await,
            RemoteOp::Increment(field, delta) => {
                remote.increment_number(&user, *field, *delta).await
            }
        };
        if let Err(err) = result {
            warn!(user_id = %user, ?op, error = %err, "remote push failed");
            return;
        }
    }
    debug!(user_id = %user, count, "remote push applied");
}
