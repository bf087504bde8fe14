//! One captioned still per narration step.
//!
//! Steps are processed in order, one at a time. Each step's prompt goes to the
//! image backend under the retry policy; the result is captioned with the step
//! text. What happens when a step still fails is decided by
//! [`StepFailurePolicy`]: skip it, or abort the whole run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clipmaker_agent::{ImageGenError, ImageGenerator};
use clipmaker_core::{
    CaptionedImage, ImageConfig, ImageSource, NarrationStep, PromptMode, RetryPolicy, RunWorkspace,
    StepFailurePolicy,
};
use clipmaker_media::Compositor;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result, StepError};

/// Writes a captioned still for an image source.
///
/// Implemented by [`Compositor`]; tests substitute a stub.
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(
        &self,
        source: &ImageSource,
        caption: &str,
        out_path: &Path,
    ) -> clipmaker_media::Result<PathBuf>;
}

#[async_trait]
impl Composer for Compositor {
    async fn compose(
        &self,
        source: &ImageSource,
        caption: &str,
        out_path: &Path,
    ) -> clipmaker_media::Result<PathBuf> {
        Compositor::compose(self, source, caption, out_path).await
    }
}

/// Receives per-step progress.
pub trait StepObserver: Send + Sync {
    /// A step is about to be rendered.
    fn on_step_started(&self, _index: usize, _total: usize, _step: &NarrationStep) {}

    /// A step finished; `ok` is false when it was skipped or aborted the run.
    fn on_step_finished(&self, _index: usize, _ok: bool) {}
}

/// Build the image prompt for a step.
pub fn build_prompt(mode: PromptMode, style: &str, step: &NarrationStep) -> String {
    match mode {
        PromptMode::Theme => style.to_string(),
        PromptMode::ThemeWithStep => {
            let style = style.trim_end();
            if style.is_empty() {
                step.text.clone()
            } else if style.ends_with('.') {
                format!("{} {}", style, step.text)
            } else {
                format!("{}. {}", style, step.text)
            }
        }
    }
}

/// Generates the captioned stills for a run.
pub struct ImageSetGenerator {
    generator: Arc<dyn ImageGenerator>,
    composer: Arc<dyn Composer>,
    retry: RetryPolicy,
    on_failure: StepFailurePolicy,
    prompt_mode: PromptMode,
    style_prompt: String,
}

impl ImageSetGenerator {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        composer: Arc<dyn Composer>,
        config: &ImageConfig,
    ) -> Self {
        Self {
            generator,
            composer,
            retry: config.retry.clone(),
            on_failure: config.on_step_failure,
            prompt_mode: config.prompt_mode,
            style_prompt: config.style_prompt.clone(),
        }
    }

    /// Render every step into `workspace`, in narration order.
    ///
    /// Skipped steps leave no gap-filler: the result may be shorter than
    /// `steps` but is never reordered. Fails with [`PipelineError::NoImages`]
    /// when nothing was produced.
    pub async fn generate(
        &self,
        steps: &[NarrationStep],
        workspace: &RunWorkspace,
        observer: Option<&dyn StepObserver>,
    ) -> Result<Vec<CaptionedImage>> {
        let total = steps.len();
        let mut images = Vec::with_capacity(total);

        for (index, step) in steps.iter().enumerate() {
            if let Some(obs) = observer {
                obs.on_step_started(index, total, step);
            }

            match self.render_step(index, step, workspace).await {
                Ok(image) => {
                    info!(step = index, label = %step.label, "Still ready");
                    images.push(image);
                    if let Some(obs) = observer {
                        obs.on_step_finished(index, true);
                    }
                }
                Err(e) => {
                    if let Some(obs) = observer {
                        obs.on_step_finished(index, false);
                    }
                    match self.on_failure {
                        StepFailurePolicy::Abort => {
                            error!(step = index, label = %step.label, error = %e, "Step failed, aborting run");
                            return Err(PipelineError::StepFailed {
                                index,
                                label: step.label.clone(),
                                source: e,
                            });
                        }
                        StepFailurePolicy::Skip => {
                            warn!(step = index, label = %step.label, error = %e, "Step failed, skipping");
                        }
                    }
                }
            }
        }

        if images.is_empty() {
            return Err(PipelineError::NoImages);
        }
        info!(produced = images.len(), requested = total, "Image set complete");
        Ok(images)
    }

    async fn render_step(
        &self,
        index: usize,
        step: &NarrationStep,
        workspace: &RunWorkspace,
    ) -> std::result::Result<CaptionedImage, StepError> {
        let prompt = build_prompt(self.prompt_mode, &self.style_prompt, step);
        let generator = &self.generator;

        let source = self
            .retry
            .run(
                |attempt| {
                    let prompt = prompt.as_str();
                    async move {
                        debug!(step = index, attempt, backend = generator.name(), "Requesting image");
                        generator.generate(prompt).await
                    }
                },
                ImageGenError::is_retryable,
            )
            .await?;

        let path = workspace.still_path(index, &step.label);
        let path = self.composer.compose(&source, &step.text, &path).await?;

        Ok(CaptionedImage {
            index,
            path,
            caption: step.text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_theme() {
        let step = NarrationStep::new("Step 1", "Breathe in.");
        assert_eq!(build_prompt(PromptMode::Theme, "pastel, dreamy", &step), "pastel, dreamy");
    }

    #[test]
    fn test_build_prompt_theme_with_step() {
        let step = NarrationStep::new("Step 1", "Breathe in.");
        assert_eq!(
            build_prompt(PromptMode::ThemeWithStep, "pastel, dreamy", &step),
            "pastel, dreamy. Breathe in."
        );
        assert_eq!(
            build_prompt(PromptMode::ThemeWithStep, "Hyper-realistic. ", &step),
            "Hyper-realistic. Breathe in."
        );
        assert_eq!(build_prompt(PromptMode::ThemeWithStep, "", &step), "Breathe in.");
    }
}
