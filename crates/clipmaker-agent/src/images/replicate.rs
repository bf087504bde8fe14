//! Replicate predictions API.

use std::time::Duration;

use async_trait::async_trait;
use clipmaker_core::ImageSource;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::{check_status, non_empty_source, ImageGenerator};
use crate::error::{ImageGenError, ImageResult};

const API_BASE: &str = "https://api.replicate.com/v1";

/// Delay between polls of a running prediction.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls before a running prediction is given up on.
const MAX_POLLS: u32 = 90;

/// Client for `POST /v1/models/{owner}/{name}/predictions`.
pub struct ReplicateClient {
    pub(super) http: reqwest::Client,
    pub(super) api_token: String,
    pub(super) model: String,
    pub(super) negative_prompt: String,
    pub(super) guidance_scale: f32,
    pub(super) num_inference_steps: u32,
    pub(super) aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Where a prediction stands after one response.
#[derive(Debug, PartialEq)]
enum PredictionState {
    Done(ImageSource),
    Pending(String),
}

impl ReplicateClient {
    fn input(&self, prompt: &str) -> Value {
        json!({
            "input": {
                "prompt": prompt,
                "negative_prompt": self.negative_prompt,
                "guidance_scale": self.guidance_scale,
                "num_inference_steps": self.num_inference_steps,
                "aspect_ratio": self.aspect_ratio,
            }
        })
    }

    async fn poll(&self, url: &str) -> ImageResult<Prediction> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

/// Interpret a prediction: finished output, still running, or failed.
fn classify(prediction: Prediction) -> ImageResult<PredictionState> {
    match prediction.status.as_str() {
        "succeeded" => Ok(PredictionState::Done(first_output(prediction.output)?)),
        "failed" | "canceled" => {
            let reason = match prediction.error {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => prediction.status,
            };
            Err(ImageGenError::PredictionFailed(reason))
        }
        _ => prediction
            .urls
            .and_then(|u| u.get)
            .map(PredictionState::Pending)
            .ok_or_else(|| ImageGenError::Decode("running prediction has no poll URL".into())),
    }
}

/// The output is either a single URL or a list of URLs.
fn first_output(output: Option<Value>) -> ImageResult<ImageSource> {
    match output {
        Some(Value::String(url)) => non_empty_source(Some(&url)),
        Some(Value::Array(items)) => non_empty_source(items.first().and_then(Value::as_str)),
        _ => Err(ImageGenError::EmptyOutput),
    }
}

#[async_trait]
impl ImageGenerator for ReplicateClient {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn generate(&self, prompt: &str) -> ImageResult<ImageSource> {
        let url = format!("{}/models/{}/predictions", API_BASE, self.model);
        trace!(model = %self.model, "Creating prediction");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&self.input(prompt))
            .send()
            .await?;
        let mut prediction: Prediction = check_status(response).await?.json().await?;

        for _ in 0..MAX_POLLS {
            let id = prediction.id.clone();
            match classify(prediction)? {
                PredictionState::Done(source) => {
                    debug!(prediction = %id, "Prediction succeeded");
                    return Ok(source);
                }
                PredictionState::Pending(poll_url) => {
                    trace!(prediction = %id, "Prediction still running");
                    tokio::time::sleep(POLL_INTERVAL).await;
                    prediction = self.poll(&poll_url).await?;
                }
            }
        }

        match classify(prediction)? {
            PredictionState::Done(source) => Ok(source),
            PredictionState::Pending(_) => Err(ImageGenError::Transport(format!(
                "prediction did not finish after {} polls",
                MAX_POLLS
            ))),
        }
    }
}
