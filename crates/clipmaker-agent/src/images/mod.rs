//! Image generation backends.
//!
//! Every backend turns a text prompt into an [`ImageSource`], usually the URL of
//! the generated picture. Retrying is left to the caller; errors carry
//! [`ImageGenError::is_retryable`] so the caller can classify them.

mod fal;
mod openai;
mod replicate;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clipmaker_core::{ImageBackendConfig, ImageSource};

use crate::error::{ImageGenError, ImageResult};

pub use fal::FalClient;
pub use openai::OpenAiImageClient;
pub use replicate::ReplicateClient;

/// Request timeout for image generation calls.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

/// A service that renders a prompt into an image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Generate one image for `prompt`.
    async fn generate(&self, prompt: &str) -> ImageResult<ImageSource>;
}

/// Build the backend selected in the configuration.
pub fn create_image_generator(config: &ImageBackendConfig) -> ImageResult<Arc<dyn ImageGenerator>> {
    let http = http_client()?;
    let generator: Arc<dyn ImageGenerator> = match config {
        ImageBackendConfig::Replicate {
            api_token,
            model,
            negative_prompt,
            guidance_scale,
            num_inference_steps,
            aspect_ratio,
        } => Arc::new(ReplicateClient {
            http,
            api_token: api_token.clone(),
            model: model.clone(),
            negative_prompt: negative_prompt.clone(),
            guidance_scale: *guidance_scale,
            num_inference_steps: *num_inference_steps,
            aspect_ratio: aspect_ratio.clone(),
        }),
        ImageBackendConfig::Fal { api_key, model } => Arc::new(FalClient {
            http,
            api_key: api_key.clone(),
            model: model.clone(),
        }),
        ImageBackendConfig::OpenAi {
            api_key,
            base_url,
            model,
            size,
        } => Arc::new(OpenAiImageClient {
            http,
            api_key: api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.clone(),
            size: size.clone(),
        }),
    };
    Ok(generator)
}

fn http_client() -> ImageResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(GENERATION_TIMEOUT)
        .build()
        .map_err(|e| ImageGenError::Transport(format!("HTTP client: {}", e)))
}

/// Turn a non-success response into [`ImageGenError::Api`].
async fn check_status(response: reqwest::Response) -> ImageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ImageGenError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Map a possibly-empty URL to an image source.
fn non_empty_source(url: Option<&str>) -> ImageResult<ImageSource> {
    match url.map(str::trim) {
        Some(url) if !url.is_empty() => Ok(ImageSource::parse(url)),
        _ => Err(ImageGenError::EmptyOutput),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_each_backend() {
        let replicate = ImageBackendConfig::Replicate {
            api_token: "r8_token".into(),
            model: "black-forest-labs/flux-pro".into(),
            negative_prompt: "nsfw".into(),
            guidance_scale: 7.5,
            num_inference_steps: 50,
            aspect_ratio: "9:16".into(),
        };
        assert_eq!(create_image_generator(&replicate).unwrap().name(), "replicate");

        let fal = ImageBackendConfig::Fal {
            api_key: "fal-key".into(),
            model: "fal-ai/flux/dev".into(),
        };
        assert_eq!(create_image_generator(&fal).unwrap().name(), "fal");

        let openai = ImageBackendConfig::OpenAi {
            api_key: "sk-test".into(),
            base_url: "https://api.openai.com/v1/".into(),
            model: "dall-e-3".into(),
            size: "1024x1792".into(),
        };
        assert_eq!(create_image_generator(&openai).unwrap().name(), "openai");
    }

    #[test]
    fn test_non_empty_source() {
        assert_eq!(
            non_empty_source(Some("https://cdn.example.com/out.png")).unwrap(),
            ImageSource::Url("https://cdn.example.com/out.png".into())
        );
        assert!(matches!(non_empty_source(Some("  ")), Err(ImageGenError::EmptyOutput)));
        assert!(matches!(non_empty_source(None), Err(ImageGenError::EmptyOutput)));
    }
}
