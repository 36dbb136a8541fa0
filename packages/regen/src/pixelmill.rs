//! PixelMill implementation of [`RemoteJobClient`].

use async_trait::async_trait;
use pixelmill_client::{GeneratedImage, GenerationInput, PixelmillClient, PixelmillError};

use crate::client::{ClientError, ClientResult, RemoteJobClient};
use crate::types::{Artifact, GenerationRequest, JobHandle, Readiness};

/// Adapter over [`PixelmillClient`].
pub struct PixelmillBackend {
    client: PixelmillClient,
}

impl PixelmillBackend {
    pub fn new(client: PixelmillClient) -> Self {
        Self { client }
    }
}

impl From<PixelmillError> for ClientError {
    fn from(err: PixelmillError) -> Self {
        match err {
            PixelmillError::Config(msg) => ClientError::Transport(msg),
            PixelmillError::Transport(e) => ClientError::Transport(e.to_string()),
            PixelmillError::Api { status, message } => ClientError::Api { status, message },
            PixelmillError::Protocol(msg) => ClientError::Protocol(msg),
        }
    }
}

fn artifact_from_image(image: GeneratedImage) -> Artifact {
    let readiness = match image.status.as_str() {
        "COMPLETE" => Readiness::Ready,
        "QUEUED" | "PENDING" | "IN_PROGRESS" => Readiness::Pending,
        _ => Readiness::Unknown,
    };

    // The service occasionally marks a slot COMPLETE before its CDN URL is
    // filled in; such a slot is not downloadable yet.
    let download_url = match readiness {
        Readiness::Ready => image.url.filter(|url| !url.is_empty()),
        _ => None,
    };

    Artifact {
        id: image.id,
        readiness,
        download_url,
        width: image.width,
        height: image.height,
    }
}

#[async_trait]
impl RemoteJobClient for PixelmillBackend {
    async fn submit(&self, request: &GenerationRequest) -> ClientResult<JobHandle> {
        let input = GenerationInput::prompt(&request.prompt);
        let job = self.client.create_generation(&input).await?;
        Ok(JobHandle(job.generation_id))
    }

    async fn status(&self, handle: &JobHandle) -> ClientResult<Vec<Artifact>> {
        let snapshot = self.client.get_generation(&handle.0).await?;
        Ok(snapshot
            .images
            .into_iter()
            .map(artifact_from_image)
            .collect())
    }

    async fn delete(&self, handle: &JobHandle) -> ClientResult<()> {
        self.client.delete_generation(&handle.0).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(status: &str, url: Option<&str>) -> GeneratedImage {
        GeneratedImage {
            id: "img-1".into(),
            status: status.into(),
            url: url.map(Into::into),
            width: Some(1024),
            height: Some(1024),
        }
    }

    #[test]
    fn test_complete_image_maps_to_ready() {
        let artifact = artifact_from_image(image("COMPLETE", Some("https://cdn/img-1.png")));
        assert_eq!(artifact.readiness, Readiness::Ready);
        assert!(artifact.is_downloadable());
    }

    #[test]
    fn test_complete_image_without_url_is_not_downloadable() {
        let artifact = artifact_from_image(image("COMPLETE", None));
        assert_eq!(artifact.readiness, Readiness::Ready);
        assert!(!artifact.is_downloadable());
    }

    #[test]
    fn test_in_flight_statuses_map_to_pending() {
        for status in ["QUEUED", "PENDING", "IN_PROGRESS"] {
            let artifact = artifact_from_image(image(status, None));
            assert_eq!(artifact.readiness, Readiness::Pending);
        }
    }

    #[test]
    fn test_unrecognized_status_maps_to_unknown() {
        let artifact = artifact_from_image(image("MODERATED", Some("https://cdn/img-1.png")));
        assert_eq!(artifact.readiness, Readiness::Unknown);
        // No download reference outside the ready state, whatever the wire says.
        assert!(artifact.download_url.is_none());
    }

    #[test]
    fn test_not_found_survives_error_mapping() {
        let err: ClientError = PixelmillError::Api {
            status: 404,
            message: "no such generation".into(),
        }
        .into();
        assert!(err.is_not_found());
    }
}
