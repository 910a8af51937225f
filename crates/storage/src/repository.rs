use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tutor_core::model::UserId;

use crate::document::RemoteRecord;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store unavailable")]
    Unavailable,
}

//
// ─── LOCAL STORE ───────────────────────────────────────────────────────────────
//

/// Durable key-value store on the learner's device.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

//
// ─── REMOTE STORE ──────────────────────────────────────────────────────────────
//

/// Set-valued fields of a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteSetField {
    CompletedLessons,
    EarnedBadges,
}

impl RemoteSetField {
    /// Field name in the remote document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteSetField::CompletedLessons => "lessons_completed",
            RemoteSetField::EarnedBadges => "badges",
        }
    }
}

/// Numeric fields of a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCounterField {
    TotalPoints,
    Streak,
}

impl RemoteCounterField {
    /// Field name in the remote document.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteCounterField::TotalPoints => "points",
            RemoteCounterField::Streak => "streak_days",
        }
    }
}

/// Cloud record keyed by learner identity. May have concurrent writers.
///
/// Appends and increments commute, so they are preferred over
/// `overwrite_record` for routine updates.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the record for `user`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport or decoding failures.
    async fn get_record(&self, user: &UserId) -> Result<Option<RemoteRecord>, StorageError>;

    /// Create the record if it does not exist yet. An existing record is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport failures.
    async fn create_record(&self, user: &UserId, defaults: &RemoteRecord)
    -> Result<(), StorageError>;

    /// Add `value` to a set field (no-op if already present).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record is missing, or transport errors.
    async fn append_to_set(
        &self,
        user: &UserId,
        field: RemoteSetField,
        value: &str,
    ) -> Result<(), StorageError>;

    /// Add `delta` to a numeric field.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record is missing, or transport errors.
    async fn increment_number(
        &self,
        user: &UserId,
        field: RemoteCounterField,
        delta: i64,
    ) -> Result<(), StorageError>;

    /// Replace the whole record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport failures.
    async fn overwrite_record(&self, user: &UserId, record: &RemoteRecord)
    -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTERS ────────────────────────────────────────────────────────
//

/// In-memory local store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryLocalStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// In-memory remote store. Can be switched offline to simulate outages.
#[derive(Clone, Default)]
pub struct InMemoryRemoteStore {
    records: Arc<Mutex<HashMap<UserId, RemoteRecord>>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StorageError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls received, including failed ones.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn with_records<T>(
        &self,
        f: impl FnOnce(&mut HashMap<UserId, RemoteRecord>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        f(&mut guard)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get_record(&self, user: &UserId) -> Result<Option<RemoteRecord>, StorageError> {
        self.with_records(|records| Ok(records.get(user).cloned()))
    }

    async fn create_record(
        &self,
        user: &UserId,
        defaults: &RemoteRecord,
    ) -> Result<(), StorageError> {
        self.with_records(|records| {
            records
                .entry(user.clone())
                .or_insert_with(|| defaults.clone());
            Ok(())
        })
    }

    async fn append_to_set(
        &self,
        user: &UserId,
        field: RemoteSetField,
        value: &str,
    ) -> Result<(), StorageError> {
        self.with_records(|records| {
            let record = records.get_mut(user).ok_or(StorageError::NotFound)?;
            record.append(field, value);
            Ok(())
        })
    }

    async fn increment_number(
        &self,
        user: &UserId,
        field: RemoteCounterField,
        delta: i64,
    ) -> Result<(), StorageError> {
        self.with_records(|records| {
            let record = records.get_mut(user).ok_or(StorageError::NotFound)?;
            record.increment(field, delta);
            Ok(())
        })
    }

    async fn overwrite_record(
        &self,
        user: &UserId,
        record: &RemoteRecord,
    ) -> Result<(), StorageError> {
        self.with_records(|records| {
            records.insert(user.clone(), record.clone());
            Ok(())
        })
    }
}

/// Local and (optional) remote stores behind trait objects.
#[derive(Clone)]
pub struct Storage {
    pub local: Arc<dyn LocalStore>,
    pub remote: Option<Arc<dyn RemoteStore>>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let local: Arc<dyn LocalStore> = Arc::new(InMemoryLocalStore::new());
        let remote: Arc<dyn RemoteStore> = Arc::new(InMemoryRemoteStore::new());
        Self {
            local,
            remote: Some(remote),
        }
    }

    #[must_use]
    pub fn local_only(local: Arc<dyn LocalStore>) -> Self {
        Self {
            local,
            remote: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::Snapshot;
    use tutor_core::model::LessonId;

    #[tokio::test]
    async fn local_store_round_trips_and_removes() {
        let store = InMemoryLocalStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remote_appends_are_set_like() {
        let remote = InMemoryRemoteStore::new();
        let user = UserId::new("learner-1");
        remote
            .create_record(&user, &RemoteRecord::default())
            .await
            .unwrap();
        for _ in 0..2 {
            remote
                .append_to_set(&user, RemoteSetField::CompletedLessons, "email-1")
                .await
                .unwrap();
        }
        remote
            .increment_number(&user, RemoteCounterField::TotalPoints, 50)
            .await
            .unwrap();
        remote
            .increment_number(&user, RemoteCounterField::TotalPoints, 25)
            .await
            .unwrap();

        let snapshot = remote
            .get_record(&user)
            .await
            .unwrap()
            .unwrap()
            .into_snapshot();
        assert_eq!(snapshot.completed_lessons.len(), 1);
        assert!(snapshot.completed_lessons.contains(&LessonId::new("email-1")));
        assert_eq!(snapshot.total_points, 75);
    }

    #[tokio::test]
    async fn create_does_not_clobber_existing_record() {
        let remote = InMemoryRemoteStore::new();
        let user = UserId::new("learner-2");
        let first = RemoteRecord::from_snapshot(&Snapshot {
            total_points: 90,
            ..Snapshot::default()
        });
        remote.create_record(&user, &first).await.unwrap();
        remote
            .create_record(&user, &RemoteRecord::default())
            .await
            .unwrap();
        let stored = remote.get_record(&user).await.unwrap().unwrap();
        assert_eq!(stored.points, 90);
    }

    #[tokio::test]
    async fn updates_to_missing_record_are_not_found() {
        let remote = InMemoryRemoteStore::new();
        let err = remote
            .append_to_set(&UserId::new("ghost"), RemoteSetField::EarnedBadges, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn offline_remote_fails_every_call() {
        let remote = InMemoryRemoteStore::new();
        remote.set_offline(true);
        let err = remote.get_record(&UserId::new("a")).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable));
        assert_eq!(remote.call_count(), 1);
    }
}
