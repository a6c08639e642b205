//! In-memory artifact store.

use crate::{ArtifactPresence, ArtifactStore, Presence, content_hash};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use storyreel_core::{ArtifactName, ArtifactRef};
use storyreel_error::{StorageError, StorageErrorKind, StoryreelResult};
use tokio::sync::RwLock;

/// Artifact store backed by a map. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<RwLock<BTreeMap<ArtifactName, Vec<u8>>>>,
    writes: Arc<AtomicU64>,
}

impl InMemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Delete an artifact. Returns whether it existed.
    pub async fn remove(&self, name: &ArtifactName) -> bool {
        self.artifacts.write().await.remove(name).is_some()
    }

    /// Overwrite an artifact's bytes without going through `put`.
    pub async fn tamper(&self, name: &ArtifactName, data: Vec<u8>) {
        self.artifacts.write().await.insert(name.clone(), data);
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, name: &ArtifactName, data: &[u8]) -> StoryreelResult<ArtifactRef> {
        self.artifacts
            .write()
            .await
            .insert(name.clone(), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(ArtifactRef::new(
            name.clone(),
            content_hash(data),
            data.len() as u64,
        ))
    }

    async fn read(&self, name: &ArtifactName) -> StoryreelResult<Vec<u8>> {
        self.artifacts
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(name.to_string())).into())
    }

    async fn exists(&self, name: &ArtifactName) -> StoryreelResult<bool> {
        Ok(self.artifacts.read().await.contains_key(name))
    }

    async fn list(&self, chapter: u32) -> StoryreelResult<Vec<ArtifactName>> {
        Ok(self
            .artifacts
            .read()
            .await
            .keys()
            .filter(|name| *name.chapter() == chapter)
            .cloned()
            .collect())
    }

    fn local_path(&self, name: &ArtifactName) -> PathBuf {
        PathBuf::from("memory").join(format!("chapter_{:03}", name.chapter())).join(name.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ArtifactPresence for InMemoryArtifactStore {
    async fn check(&self, reference: &ArtifactRef) -> Presence {
        match self.artifacts.read().await.get(reference.name()) {
            Some(data) if &content_hash(data) == reference.content_hash() => Presence::Valid,
            Some(_) => Presence::Corrupt,
            None => Presence::Missing,
        }
    }
}
