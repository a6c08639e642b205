//! Per-chapter artifact storage for storyreel.
//!
//! Artifacts live in one directory per chapter and are named so that their
//! (chapter, scene, kind) identity is recoverable from the file name alone. Writes are
//! atomic: a reader sees either the complete file or nothing.
//!
//! # Backends
//!
//! - [`FileSystemArtifactStore`]: `{root}/chapter_{NNN}/{artifact name}`
//! - [`InMemoryArtifactStore`]: in-process map, used in tests
//!
//! Both also implement [`ArtifactPresence`], the oracle that decides whether a recorded
//! artifact can be reused.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod manifest;
mod memory;
mod presence;
mod store;

pub use filesystem::FileSystemArtifactStore;
pub use manifest::{ChapterManifest, SceneRecord, load_manifest, save_manifest};
pub use memory::InMemoryArtifactStore;
pub use presence::{ArtifactPresence, Presence};
pub use store::{ArtifactStore, content_hash};
