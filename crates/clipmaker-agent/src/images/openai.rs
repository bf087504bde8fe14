//! OpenAI images API.

use async_trait::async_trait;
use clipmaker_core::ImageSource;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{check_status, non_empty_source, ImageGenerator};
use crate::error::ImageResult;

/// Client for `POST {base_url}/images/generations`.
pub struct OpenAiImageClient {
    pub(super) http: reqwest::Client,
    pub(super) api_key: String,
    pub(super) base_url: String,
    pub(super) model: String,
    pub(super) size: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

impl OpenAiImageClient {
    fn body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size,
        })
    }
}

fn first_url(response: &GenerationResponse) -> ImageResult<ImageSource> {
    non_empty_source(response.data.first().and_then(|d| d.url.as_deref()))
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> ImageResult<ImageSource> {
        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.body(prompt))
            .send()
            .await?;
        let response: GenerationResponse = check_status(response).await?.json().await?;
        debug!(model = %self.model, "Image generated");
        first_url(&response)
    }
}
