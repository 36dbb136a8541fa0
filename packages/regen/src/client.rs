//! Transport trait for the remote generation service.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Artifact, GenerationRequest, JobHandle};

/// Result type for remote client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by a [`RemoteJobClient`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Network-level failure reaching the service.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the service.
    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A response that does not match the documented shape.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// True when the service reported the job as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}

/// Thin transport adapter for the remote generation service.
///
/// Implementations perform exactly one network call per method and never
/// retry. Retry and deadline policy live in the saga, which keeps every
/// implementation trivially fakeable.
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Submit a generation request. Returns the handle of the created job.
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<JobHandle>;

    /// Fetch a fresh artifact snapshot for a job.
    ///
    /// A snapshot with zero artifacts is a valid "nothing yet" answer, not
    /// an error.
    async fn status(&self, handle: &JobHandle) -> ClientResult<Vec<Artifact>>;

    /// Delete a job. Deleting an already-deleted job surfaces as a 404
    /// `Api` error; callers treat that as tolerable.
    async fn delete(&self, handle: &JobHandle) -> ClientResult<()>;
}
