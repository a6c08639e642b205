//! Artifact store trait.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use storyreel_core::{ArtifactName, ArtifactRef};
use storyreel_error::{StorageError, StorageErrorKind, StoryreelResult};

/// Compute the SHA-256 hex digest of `data`.
///
/// # Examples
///
/// ```
/// use storyreel_storage::content_hash;
///
/// assert_eq!(
///     content_hash(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Storage for named chapter artifacts.
///
/// Implementations must make `put` atomic and must keep chapters in separate
/// namespaces so concurrent chapters never touch each other's files.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write an artifact, replacing any previous content under the same name.
    async fn put(&self, name: &ArtifactName, data: &[u8]) -> StoryreelResult<ArtifactRef>;

    /// Read an artifact by name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no artifact has that name.
    async fn read(&self, name: &ArtifactName) -> StoryreelResult<Vec<u8>>;

    /// Whether an artifact with this name exists.
    async fn exists(&self, name: &ArtifactName) -> StoryreelResult<bool>;

    /// All artifacts stored for a chapter, sorted by name.
    async fn list(&self, chapter: u32) -> StoryreelResult<Vec<ArtifactName>>;

    /// Location a media tool can read the artifact from.
    fn local_path(&self, name: &ArtifactName) -> PathBuf;

    /// Backend identifier (e.g., "filesystem", "memory").
    fn backend_name(&self) -> &'static str;

    /// Read an artifact and check it still matches its reference.
    ///
    /// # Errors
    ///
    /// `HashMismatch` if the bytes changed since the reference was taken.
    async fn read_verified(&self, reference: &ArtifactRef) -> StoryreelResult<Vec<u8>> {
        let data = self.read(reference.name()).await?;
        let actual = content_hash(&data);
        if &actual != reference.content_hash() {
            return Err(StorageError::new(StorageErrorKind::HashMismatch {
                name: reference.name().to_string(),
                expected: reference.content_hash().clone(),
                actual,
            })
            .into());
        }
        Ok(data)
    }

    /// Read an artifact as UTF-8 text.
    async fn read_text(&self, name: &ArtifactName) -> StoryreelResult<String> {
        let data = self.read(name).await?;
        String::from_utf8(data).map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", name, e))).into()
        })
    }
}
