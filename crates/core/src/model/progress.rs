use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::Snapshot;
use crate::model::curriculum::Curriculum;
use crate::model::ids::{BadgeId, LessonId, UserId};

//
// ─── PREFERENCES ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    HighContrast,
}

/// Device-local display and playback settings.
///
/// Never merged across replicas; the local copy always wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub language: String,
    pub font_size: FontSize,
    pub theme: Theme,
    pub sound_enabled: bool,
    pub autoplay: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            font_size: FontSize::default(),
            theme: Theme::default(),
            sound_enabled: true,
            autoplay: false,
        }
    }
}

//
// ─── LESSON SCORE ──────────────────────────────────────────────────────────────
//

/// Result of the most recent attempt at a lesson's quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonScore {
    pub lesson_id: LessonId,
    /// Percentage, 0..=100.
    pub score: u8,
    /// Reward for this attempt.
    pub points: u32,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
    pub is_perfect: bool,
}

impl LessonScore {
    /// Placeholder for a completion learned from another replica, which
    /// carries no per-attempt detail.
    #[must_use]
    pub fn synced(lesson_id: LessonId, at: DateTime<Utc>) -> Self {
        Self {
            lesson_id,
            score: 0,
            points: 0,
            attempts: 0,
            completed_at: at,
            is_perfect: false,
        }
    }
}

//
// ─── USER PROGRESS ─────────────────────────────────────────────────────────────
//

/// The single per-learner progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: UserId,
    pub completed_lessons: BTreeSet<LessonId>,
    pub unlocked_lessons: BTreeSet<LessonId>,
    pub current_lesson: Option<LessonId>,
    pub scores: BTreeMap<LessonId, LessonScore>,
    pub earned_badges: BTreeSet<BadgeId>,
    pub total_points: u64,
    pub last_active: DateTime<Utc>,
    pub streak: u32,
    #[serde(default)]
    pub preferences: Preferences,
}

impl UserProgress {
    /// Conservative starting record: only the first lesson is unlocked.
    #[must_use]
    pub fn new_default(user_id: UserId, curriculum: &Curriculum, now: DateTime<Utc>) -> Self {
        let first = curriculum.first_lesson().id.clone();
        Self {
            user_id,
            completed_lessons: BTreeSet::new(),
            unlocked_lessons: BTreeSet::from([first.clone()]),
            current_lesson: Some(first),
            scores: BTreeMap::new(),
            earned_badges: BTreeSet::new(),
            total_points: 0,
            last_active: now,
            streak: 0,
            preferences: Preferences::default(),
        }
    }

    /// The mergeable subset exchanged with the remote store.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            completed_lessons: self.completed_lessons.clone(),
            total_points: self.total_points,
            earned_badges: self.earned_badges.clone(),
            streak: self.streak,
        }
    }

    /// Applies a reconciled snapshot.
    ///
    /// Sets are unioned so the record never loses local knowledge; counters
    /// take the snapshot's values. Completions that only the other replica
    /// knew about become unlocked and get a placeholder score.
    pub fn absorb_snapshot(&mut self, snapshot: Snapshot, now: DateTime<Utc>) {
        for lesson in &snapshot.completed_lessons {
            self.unlocked_lessons.insert(lesson.clone());
            self.scores
                .entry(lesson.clone())
                .or_insert_with(|| LessonScore::synced(lesson.clone(), now));
        }
        self.completed_lessons.extend(snapshot.completed_lessons);
        self.earned_badges.extend(snapshot.earned_badges);
        self.total_points = snapshot.total_points;
        self.streak = snapshot.streak;
    }

    /// Applies a partial update.
    ///
    /// Set-valued fields are unioned in and `total_points` never decreases, so
    /// the unlock and badge monotonicity guarantees hold for any patch.
    /// Completions without a score in the record or the patch get a
    /// placeholder stamped `now`.
    pub fn apply_patch(&mut self, patch: ProgressPatch, now: DateTime<Utc>) {
        let ProgressPatch {
            completed_lessons,
            unlocked_lessons,
            current_lesson,
            scores,
            earned_badges,
            total_points,
            streak,
            preferences,
        } = patch;

        if let Some(scores) = scores {
            self.scores.extend(scores);
        }
        if let Some(completed) = completed_lessons {
            for lesson in completed {
                self.unlocked_lessons.insert(lesson.clone());
                self.scores
                    .entry(lesson.clone())
                    .or_insert_with(|| LessonScore::synced(lesson.clone(), now));
                self.completed_lessons.insert(lesson);
            }
        }
        if let Some(unlocked) = unlocked_lessons {
            self.unlocked_lessons.extend(unlocked);
        }
        if let Some(current) = current_lesson {
            self.current_lesson = current;
        }
        if let Some(badges) = earned_badges {
            self.earned_badges.extend(badges);
        }
        if let Some(points) = total_points {
            self.total_points = self.total_points.max(points);
        }
        if let Some(streak) = streak {
            self.streak = streak;
        }
        if let Some(preferences) = preferences {
            self.preferences = preferences;
        }
    }
}

/// Partial update for `UserProgress`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressPatch {
    pub completed_lessons: Option<BTreeSet<LessonId>>,
    pub unlocked_lessons: Option<BTreeSet<LessonId>>,
    pub current_lesson: Option<Option<LessonId>>,
    pub scores: Option<BTreeMap<LessonId, LessonScore>>,
    pub earned_badges: Option<BTreeSet<BadgeId>>,
    pub total_points: Option<u64>,
    pub streak: Option<u32>,
    pub preferences: Option<Preferences>,
}

impl ProgressPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn streak(mut self, days: u32) -> Self {
        self.streak = Some(days);
        self
    }

    #[must_use]
    pub fn preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    #[must_use]
    pub fn total_points(mut self, points: u64) -> Self {
        self.total_points = Some(points);
        self
    }

    #[must_use]
    pub fn current_lesson(mut self, lesson: Option<LessonId>) -> Self {
        self.current_lesson = Some(lesson);
        self
    }

    #[must_use]
    pub fn earned_badges(mut self, badges: impl IntoIterator<Item = BadgeId>) -> Self {
        self.earned_badges = Some(badges.into_iter().collect());
        self
    }

    #[must_use]
    pub fn unlocked_lessons(mut self, lessons: impl IntoIterator<Item = LessonId>) -> Self {
        self.unlocked_lessons = Some(lessons.into_iter().collect());
        self
    }

    #[must_use]
    pub fn completed_lessons(mut self, lessons: impl IntoIterator<Item = LessonId>) -> Self {
        self.completed_lessons = Some(lessons.into_iter().collect());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn progress() -> UserProgress {
        UserProgress::new_default(UserId::local(), &Curriculum::digital_literacy(), fixed_now())
    }

    #[test]
    fn default_unlocks_only_first_lesson() {
        let p = progress();
        assert_eq!(
            p.unlocked_lessons,
            BTreeSet::from([LessonId::new("email-1")])
        );
        assert_eq!(p.current_lesson, Some(LessonId::new("email-1")));
        assert!(p.completed_lessons.is_empty());
        assert_eq!(p.total_points, 0);
    }

    #[test]
    fn patch_cannot_lower_points_or_drop_unlocks() {
        let mut p = progress();
        p.total_points = 120;
        p.apply_patch(
            ProgressPatch::new()
                .total_points(40)
                .unlocked_lessons([LessonId::new("email-2")])
                .streak(3),
            fixed_now(),
        );
        assert_eq!(p.total_points, 120);
        assert!(p.unlocked_lessons.contains(&LessonId::new("email-1")));
        assert!(p.unlocked_lessons.contains(&LessonId::new("email-2")));
        assert_eq!(p.streak, 3);
    }

    #[test]
    fn patched_completions_are_unlocked_and_scored() {
        let mut p = progress();
        p.apply_patch(
            ProgressPatch::new().completed_lessons([LessonId::new("search-1")]),
            fixed_now(),
        );
        let lesson = LessonId::new("search-1");
        assert!(p.unlocked_lessons.contains(&lesson));
        assert_eq!(p.scores[&lesson], LessonScore::synced(lesson.clone(), fixed_now()));
    }

    #[test]
    fn patched_completion_keeps_existing_score() {
        let mut p = progress();
        let lesson = LessonId::new("email-1");
        let score = LessonScore {
            lesson_id: lesson.clone(),
            score: 90,
            points: 55,
            attempts: 1,
            completed_at: fixed_now(),
            is_perfect: false,
        };
        p.scores.insert(lesson.clone(), score.clone());
        p.apply_patch(
            ProgressPatch::new().completed_lessons([lesson.clone()]),
            fixed_now(),
        );
        assert_eq!(p.scores[&lesson], score);
    }

    #[test]
    fn absorb_snapshot_adds_placeholder_scores() {
        let mut p = progress();
        let snapshot = Snapshot {
            completed_lessons: BTreeSet::from([LessonId::new("email-1"), LessonId::new("email-2")]),
            total_points: 130,
            earned_badges: BTreeSet::from([BadgeId::new("first-steps")]),
            streak: 4,
        };
        p.absorb_snapshot(snapshot, fixed_now());

        assert_eq!(p.total_points, 130);
        assert_eq!(p.streak, 4);
        assert!(p.completed_lessons.is_subset(&p.unlocked_lessons));
        let placeholder = &p.scores[&LessonId::new("email-2")];
        assert_eq!(placeholder.attempts, 0);
        assert_eq!(placeholder.points, 0);
    }

    #[test]
    fn document_uses_camel_case_fields() {
        let json = serde_json::to_value(progress()).unwrap();
        assert!(json.get("completedLessons").is_some());
        assert!(json.get("totalPoints").is_some());
        assert_eq!(json["userId"], "local-user");
        assert_eq!(json["preferences"]["fontSize"], "medium");
    }

    #[test]
    fn preferences_fill_missing_fields() {
        let prefs: Preferences = serde_json::from_str(r#"{"theme": "high-contrast"}"#).unwrap();
        assert_eq!(prefs.theme, Theme::HighContrast);
        assert_eq!(prefs.language, "en");
        assert!(prefs.sound_enabled);
    }
}
