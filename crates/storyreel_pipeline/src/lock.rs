//! Per-chapter run locks.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Guard held for the duration of one chapter run.
pub type ChapterGuard = OwnedMutexGuard<()>;

/// One lock per chapter index, so two runs of the same chapter serialize while
/// different chapters never contend.
#[derive(Debug, Clone, Default)]
pub struct ChapterLocks {
    locks: Arc<Mutex<HashMap<u32, Arc<Mutex<()>>>>>,
}

impl ChapterLocks {
    /// An empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, chapter: u32) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(chapter).or_default().clone()
    }

    /// Wait for exclusive access to `chapter`.
    pub async fn lock(&self, chapter: u32) -> ChapterGuard {
        let lock = self.entry(chapter).await;
        debug!(chapter, "Waiting for chapter lock");
        lock.lock_owned().await
    }

    /// Take the lock only if no other run holds it.
    pub async fn try_lock(&self, chapter: u32) -> Option<ChapterGuard> {
        self.entry(chapter).await.try_lock_owned().ok()
    }
}
