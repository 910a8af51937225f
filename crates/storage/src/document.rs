//! Mapping between the canonical domain shapes and what each store persists.
//!
//! The local store holds the full `UserProgress` as one JSON document under
//! [`PROGRESS_KEY`]. The remote store uses its own field names
//! ([`RemoteRecord`]); nothing outside this module sees that shape.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tutor_core::Snapshot;
use tutor_core::model::{BadgeId, LessonId, UserProgress};

use crate::repository::{LocalStore, RemoteCounterField, RemoteSetField, StorageError};
use crate::sqlite::mapping::ser;

/// Key of the serialized progress document in the local store.
pub const PROGRESS_KEY: &str = "userProgress";

//
// ─── LOCAL DOCUMENT ────────────────────────────────────────────────────────────
//

/// Serializes `UserProgress` into the flat JSON document kept locally.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_progress(progress: &UserProgress) -> Result<String, StorageError> {
    serde_json::to_string(progress).map_err(ser)
}

/// Parses the local JSON document.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed documents.
pub fn decode_progress(raw: &str) -> Result<UserProgress, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// Typed view over a `LocalStore` holding the progress document.
#[derive(Clone)]
pub struct LocalProgressStore {
    store: Arc<dyn LocalStore>,
}

impl LocalProgressStore {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Load the saved progress, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure or a malformed document.
    pub async fn load(&self) -> Result<Option<UserProgress>, StorageError> {
        match self.store.get(PROGRESS_KEY).await? {
            Some(raw) => decode_progress(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Persist `progress`, replacing any previous document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or writing fails.
    pub async fn save(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let raw = encode_progress(progress)?;
        self.store.set(PROGRESS_KEY, &raw).await
    }

    /// Delete the saved document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(PROGRESS_KEY).await
    }
}

//
// ─── REMOTE RECORD ─────────────────────────────────────────────────────────────
//

/// Remote document for one learner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(default)]
    pub lessons_completed: Vec<String>,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub streak_days: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            lessons_completed: snapshot
                .completed_lessons
                .iter()
                .map(|id| id.as_str().to_owned())
                .collect(),
            points: snapshot.total_points,
            badges: snapshot
                .earned_badges
                .iter()
                .map(|id| id.as_str().to_owned())
                .collect(),
            streak_days: snapshot.streak,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Canonical snapshot. Blank ids written by other clients are dropped.
    #[must_use]
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            completed_lessons: self
                .lessons_completed
                .iter()
                .filter_map(|raw| raw.parse::<LessonId>().ok())
                .collect(),
            total_points: self.points,
            earned_badges: self
                .badges
                .iter()
                .filter_map(|raw| raw.parse::<BadgeId>().ok())
                .collect(),
            streak: self.streak_days,
        }
    }

    #[must_use]
    pub fn set(&self, field: RemoteSetField) -> &[String] {
        match field {
            RemoteSetField::CompletedLessons => &self.lessons_completed,
            RemoteSetField::EarnedBadges => &self.badges,
        }
    }

    /// Array-union style append.
    pub fn append(&mut self, field: RemoteSetField, value: &str) {
        let values = match field {
            RemoteSetField::CompletedLessons => &mut self.lessons_completed,
            RemoteSetField::EarnedBadges => &mut self.badges,
        };
        if !values.iter().any(|v| v == value) {
            values.push(value.to_owned());
        }
    }

    /// Saturating increment; negative deltas decrement down to zero.
    pub fn increment(&mut self, field: RemoteCounterField, delta: i64) {
        match field {
            RemoteCounterField::TotalPoints => {
                self.points = self.points.saturating_add_signed(delta);
            }
            RemoteCounterField::Streak => {
                let delta = i32::try_from(delta).unwrap_or(if delta < 0 {
                    i32::MIN
                } else {
                    i32::MAX
                });
                self.streak_days = self.streak_days.saturating_add_signed(delta);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryLocalStore;
    use std::collections::BTreeSet;
    use tutor_core::model::{BadgeId, Curriculum, LessonId, UserId};
    use tutor_core::time::fixed_now;

    #[tokio::test]
    async fn local_document_round_trips() {
        let backend = Arc::new(InMemoryLocalStore::new());
        let store = LocalProgressStore::new(backend.clone());
        assert!(store.load().await.unwrap().is_none());

        let mut progress =
            UserProgress::new_default(UserId::local(), &Curriculum::digital_literacy(), fixed_now());
        progress.total_points = 75;
        store.save(&progress).await.unwrap();

        let raw = backend.get(PROGRESS_KEY).await.unwrap().unwrap();
        assert!(raw.contains("\"totalPoints\":75"));
        assert_eq!(store.load().await.unwrap(), Some(progress));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_local_document_is_a_serialization_error() {
        let backend = Arc::new(InMemoryLocalStore::new());
        backend.set(PROGRESS_KEY, "{not json").await.unwrap();
        let err = LocalProgressStore::new(backend).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn remote_record_maps_field_names() {
        let snapshot = Snapshot {
            completed_lessons: BTreeSet::from([LessonId::new("email-1")]),
            total_points: 50,
            earned_badges: BTreeSet::from([BadgeId::new("first-steps")]),
            streak: 2,
        };
        let record = RemoteRecord::from_snapshot(&snapshot);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lessons_completed"][0], "email-1");
        assert_eq!(json["points"], 50);
        assert_eq!(json["streak_days"], 2);
        assert_eq!(record.into_snapshot(), snapshot);
    }

    #[test]
    fn remote_record_drops_blank_ids() {
        let record = RemoteRecord {
            lessons_completed: vec!["email-1".into(), "  ".into()],
            ..RemoteRecord::default()
        };
        assert_eq!(record.into_snapshot().completed_lessons.len(), 1);
    }

    #[test]
    fn decrement_saturates_at_zero() {
        let mut record = RemoteRecord::default();
        record.increment(RemoteCounterField::TotalPoints, -10);
        record.increment(RemoteCounterField::Streak, 3);
        record.increment(RemoteCounterField::Streak, -5);
        assert_eq!(record.points, 0);
        assert_eq!(record.streak_days, 0);
    }
}
