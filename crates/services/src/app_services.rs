use std::sync::Arc;

use storage::repository::Storage;
use tutor_core::model::{BadgeCatalog, Curriculum};

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress::ProgressManager;

/// Composition root: curriculum, badge catalog, and stores.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    curriculum: Arc<Curriculum>,
    badges: Arc<BadgeCatalog>,
    storage: Storage,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// `remote_url` of `None` runs without a remote service; every session
    /// is then local-only.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        local_url: &str,
        remote_url: Option<&str>,
        curriculum: Curriculum,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(local_url, remote_url).await?;
        Ok(Self::with_storage(storage, curriculum, clock))
    }

    #[must_use]
    pub fn with_storage(storage: Storage, curriculum: Curriculum, clock: Clock) -> Self {
        let badges = Arc::new(BadgeCatalog::standard(&curriculum));
        Self {
            clock,
            curriculum: Arc::new(curriculum),
            badges,
            storage,
        }
    }

    #[must_use]
    pub fn in_memory(curriculum: Curriculum, clock: Clock) -> Self {
        Self::with_storage(Storage::in_memory(), curriculum, clock)
    }

    /// A fresh manager over the shared stores. Call `load` on it next.
    #[must_use]
    pub fn progress_manager(&self) -> ProgressManager {
        ProgressManager::new(Arc::clone(&self.curriculum), &self.storage).with_clock(self.clock)
    }

    #[must_use]
    pub fn curriculum(&self) -> Arc<Curriculum> {
        Arc::clone(&self.curriculum)
    }

    #[must_use]
    pub fn badges(&self) -> Arc<BadgeCatalog> {
        Arc::clone(&self.badges)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}
