//! Artifact identity and references.
//!
//! Every file the pipeline writes is named so that its chapter, scene and kind can be
//! recovered from the name alone:
//!
//! | Kind | Example |
//! |------|---------|
//! | prose | `ch001_prose.txt` |
//! | scenes | `ch001_scenes.json` |
//! | image | `ch001_sc003_image.png` |
//! | audio | `ch001_sc003_audio.wav` |
//! | subtitle | `ch001_sc003_subtitle.srt`, `ch001_subtitle.srt` |
//! | video | `ch001_video.mp4` |
//! | manifest | `ch001_manifest.json` |

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use storyreel_error::{StorageError, StorageErrorKind};

/// What an artifact contains.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    /// Chapter prose
    Prose,
    /// Scene descriptor list
    Scenes,
    /// Scene image
    Image,
    /// Scene narration audio
    Audio,
    /// Caption track (per scene or per chapter)
    Subtitle,
    /// Composite chapter video
    Video,
    /// Chapter manifest
    Manifest,
}

impl ArtifactKind {
    /// Default file extension for this kind.
    pub fn default_extension(&self) -> &'static str {
        match self {
            ArtifactKind::Prose => "txt",
            ArtifactKind::Scenes | ArtifactKind::Manifest => "json",
            ArtifactKind::Image => "png",
            ArtifactKind::Audio => "wav",
            ArtifactKind::Subtitle => "srt",
            ArtifactKind::Video => "mp4",
        }
    }

    /// Whether artifacts of this kind may belong to a single scene.
    pub fn is_scene_scoped(&self) -> bool {
        matches!(
            self,
            ArtifactKind::Image | ArtifactKind::Audio | ArtifactKind::Subtitle
        )
    }
}

/// A (chapter, scene, kind) triple plus file extension.
///
/// # Examples
///
/// ```
/// use storyreel_core::{ArtifactKind, ArtifactName};
///
/// let name = ArtifactName::for_scene(1, 3, ArtifactKind::Image);
/// assert_eq!(name.to_string(), "ch001_sc003_image.png");
///
/// let parsed: ArtifactName = "ch001_sc003_image.png".parse().unwrap();
/// assert_eq!(parsed, name);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_getters::Getters,
)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName {
    chapter: u32,
    scene: Option<u32>,
    kind: ArtifactKind,
    extension: String,
}

impl ArtifactName {
    /// Name for a chapter-scoped artifact.
    pub fn for_chapter(chapter: u32, kind: ArtifactKind) -> Self {
        Self {
            chapter,
            scene: None,
            kind,
            extension: kind.default_extension().to_string(),
        }
    }

    /// Name for a scene-scoped artifact.
    pub fn for_scene(chapter: u32, scene: u32, kind: ArtifactKind) -> Self {
        Self {
            chapter,
            scene: Some(scene),
            kind,
            extension: kind.default_extension().to_string(),
        }
    }

    /// Replace the extension (for example `jpg` images or `mp3` audio).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_ascii_lowercase();
        self
    }
}

impl std::fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scene {
            Some(scene) => write!(
                f,
                "ch{:03}_sc{:03}_{}.{}",
                self.chapter, scene, self.kind, self.extension
            ),
            None => write!(f, "ch{:03}_{}.{}", self.chapter, self.kind, self.extension),
        }
    }
}

impl FromStr for ArtifactName {
    type Err = StorageError;

    #[track_caller]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::new(StorageErrorKind::InvalidName(s.to_string()));

        let (stem, extension) = s.rsplit_once('.').ok_or_else(invalid)?;
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        let mut parts = stem.split('_');
        let chapter = parts
            .next()
            .and_then(|p| p.strip_prefix("ch"))
            .and_then(parse_index)
            .ok_or_else(invalid)?;

        let second = parts.next().ok_or_else(invalid)?;
        let (scene, kind) = match second.strip_prefix("sc").and_then(parse_index) {
            Some(scene) => (Some(scene), parts.next().ok_or_else(invalid)?),
            None => (None, second),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        let kind = ArtifactKind::from_str(kind).map_err(|_| invalid())?;
        if scene.is_some() && !kind.is_scene_scoped() {
            return Err(invalid());
        }

        Ok(Self {
            chapter,
            scene,
            kind,
            extension: extension.to_string(),
        })
    }
}

fn parse_index(digits: &str) -> Option<u32> {
    if digits.len() < 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|n| *n > 0)
}

impl TryFrom<String> for ArtifactName {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactName> for String {
    fn from(value: ArtifactName) -> Self {
        value.to_string()
    }
}

/// A stored artifact: its name, SHA-256 content hash and size.
///
/// Two references are equal only if they name the same file with the same bytes,
/// which is what resumption compares.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct ArtifactRef {
    name: ArtifactName,
    content_hash: String,
    size_bytes: u64,
}

impl ArtifactRef {
    /// Create a reference from its parts.
    pub fn new(name: ArtifactName, content_hash: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name,
            content_hash: content_hash.into(),
            size_bytes,
        }
    }
}
