use std::sync::Arc;

use storage::document::{LocalProgressStore, RemoteRecord};
use storage::repository::{RemoteCounterField, RemoteSetField, RemoteStore, Storage};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tutor_core::model::{
    BadgeCatalog, BadgeId, Curriculum, LessonId, LessonScore, ProgressPatch, UserId, UserProgress,
};
use tutor_core::unlock::{self, LessonStatus};
use tutor_core::{Clock, merge, scoring};

use super::sync::{RemoteOp, SyncStatus, SyncTracker, diff_ops, push_ops};
use crate::error::ProgressError;

//
// ─── COMPLETION RESULT ─────────────────────────────────────────────────────────
//

/// Outcome of `ProgressManager::complete_lesson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonCompletion {
    pub score: LessonScore,
    /// True when the lesson was not completed before this call.
    pub first_completion: bool,
    /// Lesson newly unlocked by this completion, if any.
    pub unlocked: Option<LessonId>,
}

//
// ─── MANAGER ───────────────────────────────────────────────────────────────────
//

/// Single owner of the in-memory `UserProgress`.
///
/// Every mutation applies to memory first, then writes the local store, then
/// (with an identity) hands a commutative remote push to a detached task.
/// Store failures are logged and never roll back or block the mutation.
/// Consumers observe state through [`ProgressManager::subscribe`].
pub struct ProgressManager {
    clock: Clock,
    curriculum: Arc<Curriculum>,
    local: LocalProgressStore,
    remote: Option<Arc<dyn RemoteStore>>,
    identity: Option<UserId>,
    state: UserProgress,
    changes: watch::Sender<UserProgress>,
    sync: SyncTracker,
}

impl ProgressManager {
    /// Create a manager holding the default record. Call [`Self::load`]
    /// before use to pick up persisted progress.
    #[must_use]
    pub fn new(curriculum: Arc<Curriculum>, storage: &Storage) -> Self {
        let clock = Clock::default();
        let state = UserProgress::new_default(UserId::local(), &curriculum, clock.now());
        let (changes, _) = watch::channel(state.clone());
        Self {
            clock,
            curriculum,
            local: LocalProgressStore::new(Arc::clone(&storage.local)),
            remote: storage.remote.clone(),
            identity: None,
            state,
            changes,
            sync: SyncTracker::default(),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.state.last_active = clock.now();
        self.changes.send_replace(self.state.clone());
        self
    }

    #[must_use]
    pub fn progress(&self) -> &UserProgress {
        &self.state
    }

    #[must_use]
    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    #[must_use]
    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }

    /// Receiver that sees every replacement of the progress record.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UserProgress> {
        self.changes.subscribe()
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.sync.status().is_syncing()
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.sync.status()
    }

    /// Wait for every detached remote push started so far.
    pub async fn wait_for_sync(&mut self) {
        self.sync.drain().await;
    }

    //
    // ─── LOAD ──────────────────────────────────────────────────────────────────
    //

    /// Load progress for a (possibly absent) identity.
    ///
    /// The local document is applied first. With an identity, the remote
    /// record is then merged in and the merged result written back to both
    /// stores; a missing remote record is initialized from local progress.
    /// Remote failures leave the local state in place.
    ///
    /// Pushes still in flight from earlier mutations are awaited before the
    /// remote record is read.
    pub async fn load(&mut self, identity: Option<UserId>) {
        self.identity = identity.filter(|id| !id.is_local());
        let user_id = self.identity.clone().unwrap_or_else(UserId::local);

        let local = match self.local.load().await {
            Ok(Some(mut progress)) => {
                progress.user_id = user_id.clone();
                progress
            }
            Ok(None) => {
                debug!(user_id = %user_id, "no local progress, starting from defaults");
                UserProgress::new_default(user_id.clone(), &self.curriculum, self.clock.now())
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to read local progress");
                UserProgress::new_default(user_id.clone(), &self.curriculum, self.clock.now())
            }
        };
        self.replace_state(local);

        let (Some(user), Some(remote)) = (self.identity.clone(), self.remote.clone()) else {
            debug!(user_id = %user_id, "no identity session, using local progress only");
            return;
        };

        // Pushes from earlier mutations land before the read.
        self.sync.drain().await;
        let _guard = self.sync.begin();
        match remote.get_record(&user).await {
            Ok(Some(record)) => {
                let merged = merge(&self.state.snapshot(), &record.into_snapshot());
                let now = self.clock.now();
                let mut next = self.state.clone();
                next.absorb_snapshot(merged.clone(), now);
                self.replace_state(next);
                self.persist_local().await;

                let record = RemoteRecord::from_snapshot(&merged).with_updated_at(now);
                match remote.overwrite_record(&user, &record).await {
                    Ok(()) => info!(
                        user_id = %user,
                        completed = merged.completed_lessons.len(),
                        total_points = merged.total_points,
                        "progress reconciled with remote"
                    ),
                    Err(err) => warn!(user_id = %user, error = %err, "failed to write merged progress to remote"),
                }
            }
            Ok(None) => {
                let record = RemoteRecord::from_snapshot(&self.state.snapshot())
                    .with_updated_at(self.clock.now());
                match remote.create_record(&user, &record).await {
                    Ok(()) => info!(user_id = %user, "initialized remote progress from local"),
                    Err(err) => warn!(user_id = %user, error = %err, "failed to create remote progress"),
                }
            }
            Err(err) => {
                warn!(user_id = %user, error = %err, "remote progress unavailable, continuing offline");
            }
        }
    }

    //
    // ─── MUTATIONS ─────────────────────────────────────────────────────────────
    //

    /// Merge a partial update into the record.
    ///
    /// Set fields are unioned, points never decrease. With an identity, the
    /// changes are pushed as appends/increments.
    pub async fn update_progress(&mut self, patch: ProgressPatch) {
        let before = self.state.snapshot();
        let now = self.clock.now();
        let mut next = self.state.clone();
        next.apply_patch(patch, now);
        next.last_active = now;
        let ops = diff_ops(&before, &next.snapshot());

        self.replace_state(next);
        self.persist_local().await;
        self.push(ops);
    }

    /// Record a quiz result for a lesson.
    ///
    /// Points are added on every call (re-attempts are rewarded again), but
    /// the remote is only told about the first completion. A score meeting
    /// the lesson's pass threshold advances the unlock frontier.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidScore` for scores above 100 and
    /// `ProgressError::UnknownLesson` for ids missing from the curriculum.
    pub async fn complete_lesson(
        &mut self,
        lesson_id: &LessonId,
        score: u8,
        is_perfect: bool,
    ) -> Result<LessonCompletion, ProgressError> {
        if score > 100 {
            return Err(ProgressError::InvalidScore(score));
        }
        let total_questions = self
            .curriculum
            .total_questions(lesson_id)
            .ok_or_else(|| ProgressError::UnknownLesson(lesson_id.clone()))?;

        let correct = scoring::correct_answers(score, total_questions);
        let points = scoring::points(correct, is_perfect);
        let now = self.clock.now();

        let mut next = self.state.clone();
        let attempts = next.scores.get(lesson_id).map_or(0, |s| s.attempts) + 1;
        let lesson_score = LessonScore {
            lesson_id: lesson_id.clone(),
            score,
            points,
            attempts,
            completed_at: now,
            is_perfect,
        };
        let first_completion = next.completed_lessons.insert(lesson_id.clone());
        next.unlocked_lessons.insert(lesson_id.clone());
        next.scores.insert(lesson_id.clone(), lesson_score.clone());
        next.total_points = next.total_points.saturating_add(u64::from(points));
        next.last_active = now;

        let unlocked = if unlock::is_passing(&self.curriculum, lesson_id, score) {
            unlock::unlock_next(&mut next, &self.curriculum, lesson_id)
        } else {
            None
        };

        self.replace_state(next);
        self.persist_local().await;

        if first_completion {
            self.push(vec![
                RemoteOp::Append(RemoteSetField::CompletedLessons, lesson_id.to_string()),
                RemoteOp::Increment(RemoteCounterField::TotalPoints, i64::from(points)),
            ]);
        }

        debug!(
            lesson_id = %lesson_id,
            score,
            points,
            attempts,
            first_completion,
            unlocked = ?unlocked,
            "lesson completed"
        );

        Ok(LessonCompletion {
            score: lesson_score,
            first_completion,
            unlocked,
        })
    }

    /// Advance the unlock frontier past `lesson_id`. Returns the lesson that
    /// became newly unlocked, if any.
    pub async fn unlock_next(&mut self, lesson_id: &LessonId) -> Option<LessonId> {
        let mut next = self.state.clone();
        let unlocked = unlock::unlock_next(&mut next, &self.curriculum, lesson_id);
        if next == self.state {
            return None;
        }
        next.last_active = self.clock.now();
        self.replace_state(next);
        self.persist_local().await;
        unlocked
    }

    /// Award a badge. Returns false if it was already earned.
    pub async fn earn_badge(&mut self, badge_id: &BadgeId) -> bool {
        if self.state.earned_badges.contains(badge_id) {
            return false;
        }

        let mut next = self.state.clone();
        next.earned_badges.insert(badge_id.clone());
        next.last_active = self.clock.now();
        self.replace_state(next);
        self.persist_local().await;
        self.push(vec![RemoteOp::Append(
            RemoteSetField::EarnedBadges,
            badge_id.to_string(),
        )]);

        info!(badge_id = %badge_id, "badge earned");
        true
    }

    /// Earn every badge in `catalog` whose rule currently holds.
    pub async fn award_eligible_badges(&mut self, catalog: &BadgeCatalog) -> Vec<BadgeId> {
        let eligible = catalog.eligible(&self.state, &self.curriculum);
        let mut awarded = Vec::with_capacity(eligible.len());
        for badge_id in eligible {
            if self.earn_badge(&badge_id).await {
                awarded.push(badge_id);
            }
        }
        awarded
    }

    /// Return to the default record and delete the local document.
    ///
    /// The remote record is left as is.
    pub async fn reset_progress(&mut self) {
        let user_id = self.state.user_id.clone();
        let fresh = UserProgress::new_default(user_id.clone(), &self.curriculum, self.clock.now());
        self.replace_state(fresh);
        if let Err(err) = self.local.clear().await {
            warn!(user_id = %user_id, error = %err, "failed to clear local progress");
        }
        info!(user_id = %user_id, "progress reset");
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn is_lesson_unlocked(&self, lesson_id: &LessonId) -> bool {
        self.state.unlocked_lessons.contains(lesson_id)
    }

    #[must_use]
    pub fn is_lesson_completed(&self, lesson_id: &LessonId) -> bool {
        self.state.completed_lessons.contains(lesson_id)
    }

    #[must_use]
    pub fn get_lesson_score(&self, lesson_id: &LessonId) -> Option<&LessonScore> {
        self.state.scores.get(lesson_id)
    }

    #[must_use]
    pub fn lesson_status(&self, lesson_id: &LessonId) -> LessonStatus {
        unlock::lesson_status(&self.state, lesson_id)
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn replace_state(&mut self, next: UserProgress) {
        self.state = next;
        self.changes.send_replace(self.state.clone());
    }

    async fn persist_local(&self) {
        if let Err(err) = self.local.save(&self.state).await {
            warn!(user_id = %self.state.user_id, error = %err, "failed to persist progress locally");
        }
    }

    fn push(&mut self, ops: Vec<RemoteOp>) {
        if ops.is_empty() {
            return;
        }
        let (Some(user), Some(remote)) = (self.identity.clone(), self.remote.clone()) else {
            return;
        };
        self.sync.spawn(push_ops(remote, user, ops));
    }
}
