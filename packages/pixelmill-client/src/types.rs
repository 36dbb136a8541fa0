use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for a new generation job.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationInput {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "numImages", skip_serializing_if = "Option::is_none")]
    pub num_images: Option<u32>,
}

impl GenerationInput {
    /// Input with just a prompt, service defaults for everything else.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: None,
            height: None,
            num_images: None,
        }
    }
}

/// Wrapper for PixelMill API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Metadata returned when a generation job is created.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationJob {
    #[serde(rename = "generationId")]
    pub generation_id: String,
    #[serde(rename = "creditCost")]
    pub credit_cost: Option<i64>,
}

/// Snapshot of a generation job and its image slots.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSnapshot {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub images: Vec<GeneratedImage>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// One image slot in a generation snapshot.
///
/// `url` is populated by the service once the slot reaches `COMPLETE`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    pub status: String,
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}
