//! Filesystem artifact store.

use crate::{ArtifactPresence, ArtifactStore, Presence, content_hash};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use storyreel_core::{ArtifactName, ArtifactRef};
use storyreel_error::{StorageError, StorageErrorKind, StoryreelResult};
use uuid::Uuid;

/// Filesystem artifact store.
///
/// Stores artifacts in one directory per chapter:
///
/// ```text
/// output/
/// ├── chapter_001/
/// │   ├── ch001_prose.txt
/// │   ├── ch001_scenes.json
/// │   ├── ch001_sc001_image.png
/// │   ├── ch001_sc001_audio.wav
/// │   ├── ch001_sc001_subtitle.srt
/// │   ├── ...
/// │   ├── ch001_subtitle.srt
/// │   ├── ch001_video.mp4
/// │   └── ch001_manifest.json
/// └── chapter_002/
/// ```
///
/// Writes go to a uniquely named temp file in the target directory and are then
/// renamed into place, so a file is either complete or absent.
#[derive(Debug, Clone)]
pub struct FileSystemArtifactStore {
    base_path: PathBuf,
}

impl FileSystemArtifactStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> StoryreelResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Opened artifact store");
        Ok(Self { base_path })
    }

    /// Root directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding one chapter's artifacts.
    pub fn chapter_dir(&self, chapter: u32) -> PathBuf {
        self.base_path.join(format!("chapter_{:03}", chapter))
    }

    fn path_for(&self, name: &ArtifactName) -> PathBuf {
        self.chapter_dir(*name.chapter()).join(name.to_string())
    }
}

#[async_trait]
impl ArtifactStore for FileSystemArtifactStore {
    #[tracing::instrument(skip(self, data), fields(name = %name, size = data.len()))]
    async fn put(&self, name: &ArtifactName, data: &[u8]) -> StoryreelResult<ArtifactRef> {
        let path = self.path_for(name);
        let dir = self.chapter_dir(*name.chapter());

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                dir.display(),
                e
            )))
        })?;

        // Unique temp name so concurrent writers never share a partial file.
        let temp_path = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
            .into());
        }

        let hash = content_hash(data);
        tracing::debug!(hash = %hash, path = %path.display(), "Stored artifact");
        Ok(ArtifactRef::new(name.clone(), hash, data.len() as u64))
    }

    #[tracing::instrument(skip(self), fields(name = %name))]
    async fn read(&self, name: &ArtifactName) -> StoryreelResult<Vec<u8>> {
        let path = self.path_for(name);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(name.to_string())).into()
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into()
            }
        })
    }

    async fn exists(&self, name: &ArtifactName) -> StoryreelResult<bool> {
        let path = self.path_for(name);
        tokio::fs::try_exists(&path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into()
        })
    }

    async fn list(&self, chapter: u32) -> StoryreelResult<Vec<ArtifactName>> {
        let dir = self.chapter_dir(chapter);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
                .into());
            }
        };

        let mut names = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;
            let Some(entry) = entry else { break };
            // Temp files and foreign files do not parse and are skipped.
            if let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(|file| file.parse::<ArtifactName>().ok())
                .filter(|name| *name.chapter() == chapter)
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn local_path(&self, name: &ArtifactName) -> PathBuf {
        self.path_for(name)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[async_trait]
impl ArtifactPresence for FileSystemArtifactStore {
    async fn check(&self, reference: &ArtifactRef) -> Presence {
        match tokio::fs::read(self.path_for(reference.name())).await {
            Ok(data) if &content_hash(&data) == reference.content_hash() => Presence::Valid,
            Ok(_) => {
                tracing::warn!(name = %reference.name(), "Artifact content changed since it was recorded");
                Presence::Corrupt
            }
            Err(_) => Presence::Missing,
        }
    }
}
