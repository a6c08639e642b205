//! Scenes and their per-scene artifacts.

use crate::{ArtifactRef, StyleTag, SubtitleTrack};
use serde::{Deserialize, Serialize};

/// Byte range of a scene's narration inside the chapter prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct NarrationSpan {
    start: usize,
    end: usize,
}

impl NarrationSpan {
    /// Create a span; `end` is exclusive.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span length in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the splitter produces for one scene.
///
/// # Examples
///
/// ```
/// use storyreel_core::{NarrationSpan, SceneDescriptor, StyleTag};
///
/// let scene = SceneDescriptor::new(
///     1,
///     "Mira left at dawn.",
///     NarrationSpan::new(0, 18),
///     "a young mage at a village gate at dawn, anime style",
///     StyleTag::Anime,
/// );
/// assert_eq!(*scene.index(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct SceneDescriptor {
    index: u32,
    narration: String,
    span: NarrationSpan,
    visual_prompt: String,
    style: StyleTag,
}

impl SceneDescriptor {
    /// Create a descriptor.
    pub fn new(
        index: u32,
        narration: impl Into<String>,
        span: NarrationSpan,
        visual_prompt: impl Into<String>,
        style: StyleTag,
    ) -> Self {
        Self {
            index,
            narration: narration.into(),
            span,
            visual_prompt: visual_prompt.into(),
            style,
        }
    }
}

/// Synthesized narration with its measured duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct AudioArtifact {
    reference: ArtifactRef,
    duration_ms: u64,
}

impl AudioArtifact {
    /// Pair an audio reference with its duration.
    pub fn new(reference: ArtifactRef, duration_ms: u64) -> Self {
        Self {
            reference,
            duration_ms,
        }
    }
}

/// A stored caption track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct SubtitleArtifact {
    reference: ArtifactRef,
    track: SubtitleTrack,
}

impl SubtitleArtifact {
    /// Pair a subtitle reference with its parsed track.
    pub fn new(reference: ArtifactRef, track: SubtitleTrack) -> Self {
        Self { reference, track }
    }
}

/// One scene of a chapter and whatever artifacts it has so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct Scene {
    descriptor: SceneDescriptor,
    image: Option<ArtifactRef>,
    audio: Option<AudioArtifact>,
    subtitle: Option<SubtitleArtifact>,
}

impl Scene {
    /// A scene with no artifacts yet.
    pub fn new(descriptor: SceneDescriptor) -> Self {
        Self {
            descriptor,
            image: None,
            audio: None,
            subtitle: None,
        }
    }

    /// Scene index (1-based).
    pub fn index(&self) -> u32 {
        *self.descriptor.index()
    }

    /// Attach the image.
    pub fn set_image(&mut self, image: ArtifactRef) {
        self.image = Some(image);
    }

    /// Attach the audio. Any subtitle timed against older audio is dropped.
    pub fn set_audio(&mut self, audio: AudioArtifact) {
        if self.audio.as_ref() != Some(&audio) {
            self.subtitle = None;
        }
        self.audio = Some(audio);
    }

    /// Attach the subtitle track.
    pub fn set_subtitle(&mut self, subtitle: SubtitleArtifact) {
        self.subtitle = Some(subtitle);
    }

    /// Audio duration, if audio exists.
    pub fn audio_duration_ms(&self) -> Option<u64> {
        self.audio.as_ref().map(|audio| audio.duration_ms)
    }

    /// Whether image and audio are present.
    pub fn has_assets(&self) -> bool {
        self.image.is_some() && self.audio.is_some()
    }

    /// Whether all three artifacts exist and the captions fit the audio.
    pub fn is_complete(&self, tolerance_ms: u64) -> bool {
        match (&self.image, &self.audio, &self.subtitle) {
            (Some(_), Some(audio), Some(subtitle)) => {
                audio.duration_ms > 0
                    && subtitle.track.end_ms() <= audio.duration_ms.saturating_add(tolerance_ms)
            }
            _ => false,
        }
    }
}
