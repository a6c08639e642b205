//! Chapter pipeline state machine.

use serde::{Deserialize, Serialize};
use storyreel_error::{ConsistencyError, ConsistencyErrorKind};

/// Pipeline stage a failure is attributed to.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    /// Prose generation
    Prose,
    /// Scene splitting
    Split,
    /// Image and speech generation
    Assets,
    /// Subtitle timing
    Subtitles,
    /// Composite assembly
    Composition,
}

/// Why a chapter failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// Backend answered with nothing usable
    #[display("EmptyOutput")]
    EmptyOutput,
    /// Every allowed attempt failed
    #[display("RetriesExhausted after {} attempts: {}", attempts, last_error)]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last error seen
        last_error: String,
    },
    /// Backend refused the request outright
    #[display("Rejected: {}", message)]
    Rejected {
        /// Backend message
        message: String,
    },
    /// Scenes still missing assets after their retry budget
    #[display("IncompleteScenes {:?}", scenes)]
    IncompleteScenes {
        /// Scene indices (1-based, ascending)
        scenes: Vec<u32>,
    },
    /// Artifacts disagree with each other
    #[display("Inconsistent {:?}: {}", scenes, detail)]
    Inconsistent {
        /// Scenes involved
        scenes: Vec<u32>,
        /// Description of the violation
        detail: String,
    },
    /// Disk or size limit failure
    #[display("Resource: {}", message)]
    Resource {
        /// Description of the failure
        message: String,
    },
    /// Chapter was cancelled
    #[display("Cancelled")]
    Cancelled,
}

/// State of one chapter in the pipeline.
///
/// Forward edges follow the stage order; `Failed` is reachable from every
/// non-terminal state; `Composed` and `Failed` are terminal.
///
/// # Examples
///
/// ```
/// use storyreel_core::{ChapterState, FailureReason, PipelineStage};
///
/// let state = ChapterState::Pending.transition(ChapterState::ProseReady).unwrap();
/// assert!(state.clone().transition(ChapterState::Composed).is_err());
///
/// let failed = state
///     .transition(ChapterState::failed(PipelineStage::Split, FailureReason::Cancelled))
///     .unwrap();
/// assert!(failed.is_terminal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChapterState {
    /// Nothing generated yet
    #[display("PENDING")]
    Pending,
    /// Prose generated and stored
    #[display("PROSE_READY")]
    ProseReady,
    /// Scene descriptors stored
    #[display("SCENES_SPLIT")]
    ScenesSplit,
    /// Per-scene image and audio calls in flight
    #[display("ASSETS_GENERATING")]
    AssetsGenerating,
    /// Every scene has image and audio
    #[display("ASSETS_COMPLETE")]
    AssetsComplete,
    /// Every scene has a subtitle track
    #[display("SUBTITLED")]
    Subtitled,
    /// Chapter video written
    #[display("COMPOSED")]
    Composed,
    /// Terminal failure
    #[display("FAILED({}, {})", stage, reason)]
    Failed {
        /// Stage that failed
        stage: PipelineStage,
        /// Failure detail
        reason: FailureReason,
    },
}

impl ChapterState {
    /// Shorthand for a failed state.
    pub fn failed(stage: PipelineStage, reason: FailureReason) -> Self {
        ChapterState::Failed { stage, reason }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChapterState::Composed | ChapterState::Failed { .. })
    }

    /// Whether the chapter finished successfully.
    pub fn is_composed(&self) -> bool {
        matches!(self, ChapterState::Composed)
    }

    /// Position along the success path; `None` for failures.
    pub fn ordinal(&self) -> Option<u8> {
        match self {
            ChapterState::Pending => Some(0),
            ChapterState::ProseReady => Some(1),
            ChapterState::ScenesSplit => Some(2),
            ChapterState::AssetsGenerating => Some(3),
            ChapterState::AssetsComplete => Some(4),
            ChapterState::Subtitled => Some(5),
            ChapterState::Composed => Some(6),
            ChapterState::Failed { .. } => None,
        }
    }

    /// Validate and perform a transition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for any edge outside the state machine.
    #[track_caller]
    pub fn transition(self, next: ChapterState) -> Result<ChapterState, ConsistencyError> {
        let allowed = match (&self, &next) {
            (from, _) if from.is_terminal() => false,
            (_, ChapterState::Failed { .. }) => true,
            (from, to) => match (from.ordinal(), to.ordinal()) {
                (Some(a), Some(b)) => b == a + 1,
                _ => false,
            },
        };

        if allowed {
            Ok(next)
        } else {
            Err(ConsistencyError::new(
                ConsistencyErrorKind::InvalidTransition {
                    from: self.to_string(),
                    to: next.to_string(),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_success_path() {
        let path = [
            ChapterState::ProseReady,
            ChapterState::ScenesSplit,
            ChapterState::AssetsGenerating,
            ChapterState::AssetsComplete,
            ChapterState::Subtitled,
            ChapterState::Composed,
        ];
        let mut state = ChapterState::Pending;
        for next in path {
            state = state.transition(next).unwrap();
        }
        assert!(state.is_composed());
        assert!(state.clone().transition(ChapterState::Pending).is_err());
        assert!(
            state
                .transition(ChapterState::failed(
                    PipelineStage::Composition,
                    FailureReason::Cancelled
                ))
                .is_err()
        );
    }

    #[test]
    fn test_cannot_skip_or_go_back() {
        assert!(
            ChapterState::ScenesSplit
                .transition(ChapterState::AssetsComplete)
                .is_err()
        );
        assert!(
            ChapterState::Subtitled
                .transition(ChapterState::ScenesSplit)
                .is_err()
        );
    }

    #[test]
    fn test_failed_display_names_stage_and_scenes() {
        let state = ChapterState::failed(
            PipelineStage::Assets,
            FailureReason::IncompleteScenes { scenes: vec![3] },
        );
        assert_eq!(state.to_string(), "FAILED(ASSETS, IncompleteScenes [3])");
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let state = ChapterState::failed(
            PipelineStage::Prose,
            FailureReason::RetriesExhausted {
                attempts: 2,
                last_error: "down".into(),
            },
        );
        let json = serde_json::to_string(&state).unwrap();
        let back: ChapterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert!(json.contains("\"state\":\"FAILED\""));
    }
}
