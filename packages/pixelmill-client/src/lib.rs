//! Pure PixelMill REST API client.
//!
//! A minimal client for the PixelMill image generation platform. Supports
//! creating generation jobs, fetching job snapshots, and deleting jobs.
//! Every method performs exactly one network call; polling, retry policy,
//! and orchestration belong to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use pixelmill_client::{GenerationInput, PixelmillClient};
//!
//! let client = PixelmillClient::from_env()?;
//!
//! let job = client
//!     .create_generation(&GenerationInput::prompt("a lighthouse at dusk"))
//!     .await?;
//!
//! let snapshot = client.get_generation(&job.generation_id).await?;
//! for image in &snapshot.images {
//!     println!("{} {}", image.id, image.status);
//! }
//!
//! client.delete_generation(&job.generation_id).await?;
//! ```

pub mod error;
pub mod types;

pub use error::{PixelmillError, Result};
pub use types::{GeneratedImage, GenerationInput, GenerationJob, GenerationSnapshot};

use serde::de::DeserializeOwned;

use types::ApiResponse;

const BASE_URL: &str = "https://api.pixelmill.io/v1";

/// Pure PixelMill API client.
#[derive(Clone)]
pub struct PixelmillClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl PixelmillClient {
    /// Create a new client with the given API token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Create from the `PIXELMILL_API_TOKEN` environment variable.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("PIXELMILL_API_TOKEN")
            .map_err(|_| PixelmillError::Config("PIXELMILL_API_TOKEN not set".into()))?;
        Ok(Self::new(token))
    }

    /// Set a custom base URL (for proxies and test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Create a generation job. Returns immediately with the job metadata;
    /// images render asynchronously on the service side.
    pub async fn create_generation(&self, input: &GenerationInput) -> Result<GenerationJob> {
        let url = format!("{}/generations", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let api_resp: ApiResponse<GenerationJob> = parse_response(resp).await?;
        let job = api_resp.data;
        if job.generation_id.is_empty() {
            return Err(PixelmillError::Protocol(
                "generation created without an id".into(),
            ));
        }

        tracing::debug!(generation_id = %job.generation_id, "generation created");
        Ok(job)
    }

    /// Fetch the current snapshot of a generation job.
    ///
    /// A snapshot with zero images is a valid answer while the service is
    /// still queueing work, not an error.
    pub async fn get_generation(&self, generation_id: &str) -> Result<GenerationSnapshot> {
        let url = format!("{}/generations/{}", self.base_url, generation_id);
        let resp = self.client.get(&url).bearer_auth(&self.token).send().await?;

        let api_resp: ApiResponse<GenerationSnapshot> = parse_response(resp).await?;
        tracing::debug!(
            generation_id,
            status = %api_resp.data.status,
            images = api_resp.data.images.len(),
            "fetched generation snapshot"
        );
        Ok(api_resp.data)
    }

    /// Delete a generation job.
    ///
    /// Surfaces the raw API result; deleting an already-deleted job comes
    /// back as a 404 `Api` error and the caller decides how severe that is.
    pub async fn delete_generation(&self, generation_id: &str) -> Result<()> {
        let url = format!("{}/generations/{}", self.base_url, generation_id);
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PixelmillError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        tracing::debug!(generation_id, "generation deleted");
        Ok(())
    }
}

/// Check the status line, then decode the body against the expected shape.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PixelmillError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| PixelmillError::Protocol(format!("unexpected response shape: {}", e)))
}
