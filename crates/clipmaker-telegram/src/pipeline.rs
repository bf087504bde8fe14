//! End-to-end clip run: steps, stills, delivery, slideshow, delivery.
//!
//! Every run gets its own [`RunWorkspace`]. The workspace is removed when the
//! run returns, whichever stage failed.

use std::path::PathBuf;
use std::sync::Arc;

use clipmaker_agent::{create_image_generator, ChatClient, StepGenerator};
use clipmaker_core::{ClipmakerConfig, RunId, RunWorkspace};
use clipmaker_media::{Compositor, ProgressObserver, SlideshowAssembler};
use tracing::{error, info, info_span, warn, Instrument};

use crate::delivery::Deliverer;
use crate::error::Result;
use crate::imageset::{ImageSetGenerator, StepObserver};

/// What a run delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Captioned stills only.
    Stills,
    /// Captioned stills, then the slideshow video.
    StillsAndVideo,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: RunId,
    pub activity: String,
    pub steps: usize,
    pub stills: usize,
    pub video: bool,
}

/// Observers for one run. Both are optional.
#[derive(Default, Clone, Copy)]
pub struct RunObservers<'a> {
    pub steps: Option<&'a dyn StepObserver>,
    pub encoding: Option<&'a dyn ProgressObserver>,
}

/// The clip pipeline, shared by all chats.
pub struct ClipPipeline {
    steps: StepGenerator,
    images: ImageSetGenerator,
    assembler: SlideshowAssembler,
    audio_path: PathBuf,
    runs_dir: PathBuf,
}

impl ClipPipeline {
    pub fn new(
        steps: StepGenerator,
        images: ImageSetGenerator,
        assembler: SlideshowAssembler,
        audio_path: PathBuf,
        runs_dir: PathBuf,
    ) -> Self {
        Self {
            steps,
            images,
            assembler,
            audio_path,
            runs_dir,
        }
    }

    /// Wire up the real chat, image and media backends.
    pub fn from_config(config: &ClipmakerConfig) -> Result<Self> {
        let chat = Arc::new(ChatClient::from_config(&config.chat)?);
        let steps = StepGenerator::new(chat, &config.chat);

        let generator = create_image_generator(&config.image.backend)?;
        let compositor = Compositor::new(
            config.caption.clone(),
            config.slideshow.width,
            config.slideshow.height,
            config.image.fetch_timeout,
        )?;
        let images = ImageSetGenerator::new(generator, Arc::new(compositor), &config.image);

        let assembler = SlideshowAssembler::new(config.slideshow.clone());

        info!(
            backend = config.image.backend.name(),
            chat_model = %config.chat.model,
            runs_dir = %config.runs_dir.display(),
            "Pipeline ready"
        );

        Ok(Self::new(
            steps,
            images,
            assembler,
            config.slideshow.audio_path.clone(),
            config.runs_dir.clone(),
        ))
    }

    /// Check that the encoder is available.
    pub fn check_encoder(&self) -> Result<PathBuf> {
        Ok(self.assembler.locate_ffmpeg()?)
    }

    /// Run once for `chat_id`.
    ///
    /// Errors are logged here with the run id before being returned.
    pub async fn run(
        &self,
        chat_id: i64,
        mode: RunMode,
        deliverer: &dyn Deliverer,
        observers: RunObservers<'_>,
    ) -> Result<RunReport> {
        let run_id = RunId::new();
        let span = info_span!("run", run_id = %run_id, chat_id);

        async move {
            info!(?mode, "Run started");
            let result = self.execute(run_id, mode, deliverer, observers).await;
            match &result {
                Ok(report) => info!(stills = report.stills, video = report.video, "Run finished"),
                Err(e) => error!(error = %e, "Run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: RunId,
        mode: RunMode,
        deliverer: &dyn Deliverer,
        observers: RunObservers<'_>,
    ) -> Result<RunReport> {
        let workspace = RunWorkspace::create(&self.runs_dir, run_id)?;

        let plan = self.steps.generate().await?;
        let images = self
            .images
            .generate(&plan.steps, &workspace, observers.steps)
            .await?;

        deliverer.send_stills(&images).await?;

        let video = if mode == RunMode::StillsAndVideo {
            let stills: Vec<PathBuf> = images.iter().map(|i| i.path.clone()).collect();
            let output = self
                .assembler
                .assemble(
                    &stills,
                    &self.audio_path,
                    &workspace.video_path(),
                    observers.encoding,
                )
                .await?;
            deliverer.send_video(&output).await?;
            true
        } else {
            false
        };

        if let Err(e) = workspace.close() {
            warn!(error = %e, "Workspace cleanup failed");
        }

        Ok(RunReport {
            run_id,
            activity: plan.activity,
            steps: plan.steps.len(),
            stills: images.len(),
            video,
        })
    }
}
