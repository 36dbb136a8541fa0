//! Applying a chosen artifact to the resource it replaces.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::types::{Artifact, TargetRef};

/// Result type for apply operations.
pub type ApplyResult<T> = std::result::Result<T, ApplyError>;

/// Apply-stage errors. All of them are terminal for the run.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The payload is larger than the configured ceiling.
    #[error("payload is {actual} bytes, over the {ceiling}-byte ceiling")]
    PayloadTooLarge { actual: u64, ceiling: u64 },

    /// The payload is not a supported image format.
    #[error("payload validation failed: {0}")]
    Validation(String),

    /// The replacement target no longer exists.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// Downloading the payload failed.
    #[error("download failed: {0}")]
    Transport(String),

    /// Filesystem failure while replacing the target.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Applies a chosen artifact to the target resource.
///
/// Not idempotent by contract: a second call may duplicate the side effect,
/// so the saga invokes it at most once per run and never retries it.
#[async_trait]
pub trait ReplacementApplier: Send + Sync {
    /// Fetch the artifact payload, bounded by `max_bytes`, and replace the
    /// resource at `target`. Returns a reference to the applied result.
    async fn apply(
        &self,
        target: &TargetRef,
        artifact: &Artifact,
        max_bytes: u64,
    ) -> ApplyResult<String>;
}

/// Download a payload, refusing to buffer more than `max_bytes`.
///
/// The ceiling is enforced twice: against the advertised `Content-Length`
/// before reading anything, and again while streaming chunks in case the
/// header lied or was absent.
pub async fn download_payload(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
) -> ApplyResult<Vec<u8>> {
    let mut resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| ApplyError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ApplyError::Transport(format!(
            "download returned {}",
            status
        )));
    }

    if let Some(advertised) = resp.content_length() {
        if advertised > max_bytes {
            return Err(ApplyError::PayloadTooLarge {
                actual: advertised,
                ceiling: max_bytes,
            });
        }
    }

    let mut payload: Vec<u8> = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| ApplyError::Transport(e.to_string()))?
    {
        let received = payload.len() as u64 + chunk.len() as u64;
        if received > max_bytes {
            return Err(ApplyError::PayloadTooLarge {
                actual: received,
                ceiling: max_bytes,
            });
        }
        payload.extend_from_slice(&chunk);
    }

    Ok(payload)
}

/// Sniff the image format of a payload from its magic bytes.
pub fn sniff_image_format(payload: &[u8]) -> Option<&'static str> {
    if payload.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some("png");
    }
    if payload.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpeg");
    }
    if payload.starts_with(b"GIF87a") || payload.starts_with(b"GIF89a") {
        return Some("gif");
    }
    if payload.len() >= 12 && &payload[0..4] == b"RIFF" && &payload[8..12] == b"WEBP" {
        return Some("webp");
    }
    None
}

/// Replaces an existing image file under a content root.
///
/// The target must already exist; this applier replaces resources, it does
/// not create them.
pub struct ImageFileApplier {
    client: reqwest::Client,
    root: PathBuf,
}

impl ImageFileApplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            root: root.into(),
        }
    }

    fn resolve(&self, target: &TargetRef) -> PathBuf {
        self.root.join(&target.0)
    }
}

#[async_trait]
impl ReplacementApplier for ImageFileApplier {
    async fn apply(
        &self,
        target: &TargetRef,
        artifact: &Artifact,
        max_bytes: u64,
    ) -> ApplyResult<String> {
        let url = artifact
            .download_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ApplyError::Validation("artifact has no download reference".into()))?;

        let path = self.resolve(target);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ApplyError::TargetNotFound(target.0.clone()));
        }

        let payload = download_payload(&self.client, url, max_bytes).await?;
        let format = sniff_image_format(&payload).ok_or_else(|| {
            ApplyError::Validation("payload is not a supported image format".into())
        })?;

        debug!(
            target_ref = %target,
            artifact = %artifact.id,
            bytes = payload.len(),
            format,
            "replacing target image"
        );

        // Stage to a sibling temp file; the rename swaps the target in one step.
        let staged = path.with_extension("staged");
        tokio::fs::write(&staged, &payload).await?;
        tokio::fs::rename(&staged, &path).await?;

        Ok(path.display().to_string())
    }
}
