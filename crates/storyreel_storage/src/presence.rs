//! Artifact presence oracle.

use async_trait::async_trait;
use storyreel_core::ArtifactRef;

/// State of a recorded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Presence {
    /// Present with the recorded content
    Valid,
    /// Not present
    Missing,
    /// Present but its content no longer matches the record
    Corrupt,
}

impl Presence {
    /// Whether the artifact can be reused.
    pub fn is_valid(&self) -> bool {
        matches!(self, Presence::Valid)
    }
}

/// Decides whether a recorded artifact is still usable.
///
/// The resumption planner only talks to this trait, so tests can inject an oracle
/// that reports artifacts missing or corrupt without touching storage.
#[async_trait]
pub trait ArtifactPresence: Send + Sync {
    /// Check one recorded artifact.
    async fn check(&self, reference: &ArtifactRef) -> Presence;
}
