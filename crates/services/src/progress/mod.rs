mod manager;
mod sync;

// Public API of the progress subsystem.
pub use crate::error::ProgressError;
pub use manager::{LessonCompletion, ProgressManager};
pub use sync::SyncStatus;
