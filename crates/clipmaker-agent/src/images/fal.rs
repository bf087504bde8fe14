//! fal.ai synchronous run endpoint.

use async_trait::async_trait;
use clipmaker_core::ImageSource;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{check_status, non_empty_source, ImageGenerator};
use crate::error::ImageResult;

const RUN_BASE: &str = "https://fal.run";

/// Client for `POST https://fal.run/{model}`.
pub struct FalClient {
    pub(super) http: reqwest::Client,
    pub(super) api_key: String,
    pub(super) model: String,
}

#[derive(Debug, Deserialize)]
struct FalResult {
    #[serde(default)]
    images: Vec<FalImage>,
}

#[derive(Debug, Deserialize)]
struct FalImage {
    url: String,
}

impl FalClient {
    fn body(prompt: &str) -> Value {
        json!({ "prompt": prompt })
    }
}

fn first_image(result: &FalResult) -> ImageResult<ImageSource> {
    non_empty_source(result.images.first().map(|i| i.url.as_str()))
}

#[async_trait]
impl ImageGenerator for FalClient {
    fn name(&self) -> &str {
        "fal"
    }

    async fn generate(&self, prompt: &str) -> ImageResult<ImageSource> {
        let response = self
            .http
            .post(format!("{}/{}", RUN_BASE, self.model))
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&Self::body(prompt))
            .send()
            .await?;
        let result: FalResult = check_status(response).await?.json().await?;
        debug!(model = %self.model, images = result.images.len(), "fal run finished");
        first_image(&result)
    }
}
