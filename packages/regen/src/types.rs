//! Value types shared across the saga.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a remote generation job.
///
/// Obtained at most once per saga run, never reused across runs, and
/// deleted exactly once before the run returns whenever it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which image slot of a page the generated artifact replaces.
///
/// Carried for prompt construction and logging. The saga never branches
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Hero,
    Thumbnail,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Hero => f.write_str("hero"),
            ImageRole::Thumbnail => f.write_str("thumbnail"),
        }
    }
}

/// Path of the resource the applied artifact replaces, relative to the
/// applier's content root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef(pub String);

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable request for one generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub target: TargetRef,
    pub role: ImageRole,
}

/// Readiness of one artifact in a status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Download available.
    Ready,
    /// Still rendering.
    Pending,
    /// The service reported a state this client does not recognize.
    Unknown,
}

/// One candidate result from a status snapshot.
///
/// Artifacts are never mutated; every poll returns a fresh snapshot that
/// supersedes the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: String,
    pub readiness: Readiness,
    /// Present iff the artifact is ready.
    pub download_url: Option<String>,
    /// Diagnostics only.
    pub width: Option<u32>,
    /// Diagnostics only.
    pub height: Option<u32>,
}

impl Artifact {
    /// True when the artifact is ready and carries a download reference.
    pub fn is_downloadable(&self) -> bool {
        self.readiness == Readiness::Ready
            && self.download_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}
