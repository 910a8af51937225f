//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;
use tutor_core::model::LessonId;

/// Errors emitted by `ProgressManager`.
///
/// Store failures never show up here: they are logged and the in-memory
/// record stays authoritative for the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown lesson: {0}")]
    UnknownLesson(LessonId),
    #[error("score must be a percentage between 0 and 100, got {0}")]
    InvalidScore(u8),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
