//! End-to-end pipeline runs against in-process fakes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipmaker_agent::client::{ChatChoice, ResponseMessage};
use clipmaker_agent::{
    ChatCompletion, ChatRequest, ChatResponse, ImageGenError, ImageGenerator, ImageResult,
    StepGenerator,
};
use clipmaker_core::{
    CaptionedImage, ChatConfig, ImageBackendConfig, ImageConfig, ImageSource, PromptMode,
    RetryPolicy, SlideshowConfig, SlideshowOutput, StepFailurePolicy,
};
use clipmaker_media::{build_args, MediaError, ProgressObserver, SlideshowAssembler};
use clipmaker_telegram::{
    create_shared_state, ClipPipeline, Composer, Deliverer, ImageSetGenerator, PipelineError,
    RunMode, RunObservers,
};
use tempfile::TempDir;

const FOUR_STEPS: &str = r#"{
    "activities": [{
        "activity": "Meditation for Inner Peace",
        "description": "A journey to tranquility.",
        "steps": [
            {"step": "Step 1", "details": "Find a quiet place."},
            {"step": "Step 2", "details": "Breathe deeply."},
            {"step": "Step 3", "details": "Take your NAD+ supplement."},
            {"step": "Step 4", "details": "Rest in stillness."}
        ]
    }]
}"#;

struct FakeChat;

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, _request: ChatRequest) -> clipmaker_agent::Result<ChatResponse> {
        Ok(ChatResponse {
            choices: vec![ChatChoice {
                message: ResponseMessage {
                    content: Some(FOUR_STEPS.to_string()),
                },
                finish_reason: Some("stop".into()),
            }],
            usage: None,
        })
    }
}

#[derive(Clone, Copy)]
enum Failure {
    Retryable,
    Permanent,
}

/// Image backend that fails for prompts containing `fail_on`.
struct FakeImages {
    fail_on: Option<&'static str>,
    failure: Failure,
    prompts: Mutex<Vec<String>>,
}

impl FakeImages {
    fn ok() -> Self {
        Self::failing(None, Failure::Retryable)
    }

    fn failing(fail_on: Option<&'static str>, failure: Failure) -> Self {
        Self {
            fail_on,
            failure,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn attempts_for(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> ImageResult<ImageSource> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.fail_on {
            Some(needle) if prompt.contains(needle) => Err(match self.failure {
                Failure::Retryable => ImageGenError::Transport("connection reset".into()),
                Failure::Permanent => ImageGenError::Api {
                    status: 400,
                    body: "prompt rejected".into(),
                },
            }),
            _ => Ok(ImageSource::Url("https://img.example/out.png".into())),
        }
    }
}

/// Writes a placeholder file instead of decoding and captioning.
struct StubComposer;

#[async_trait]
impl Composer for StubComposer {
    async fn compose(
        &self,
        _source: &ImageSource,
        caption: &str,
        out_path: &Path,
    ) -> clipmaker_media::Result<PathBuf> {
        tokio::fs::write(out_path, caption.as_bytes()).await?;
        Ok(out_path.to_path_buf())
    }
}

#[derive(Default)]
struct CapturingDelivery {
    stills: Mutex<Vec<CaptionedImage>>,
    /// Whether each still existed on disk when it was sent.
    present: Mutex<Vec<bool>>,
    videos: Mutex<Vec<PathBuf>>,
    /// Whether each video existed on disk when it was sent.
    video_present: Mutex<Vec<bool>>,
}

#[async_trait]
impl Deliverer for CapturingDelivery {
    async fn send_stills(&self, images: &[CaptionedImage]) -> clipmaker_telegram::Result<()> {
        let mut present = self.present.lock().unwrap();
        present.extend(images.iter().map(|i| i.path.exists()));
        self.stills.lock().unwrap().extend_from_slice(images);
        Ok(())
    }

    async fn send_video(&self, video: &SlideshowOutput) -> clipmaker_telegram::Result<()> {
        self.video_present.lock().unwrap().push(video.path.exists());
        self.videos.lock().unwrap().push(video.path.clone());
        Ok(())
    }
}

fn image_config(on_step_failure: StepFailurePolicy, attempts: u32) -> ImageConfig {
    ImageConfig {
        backend: ImageBackendConfig::Fal {
            api_key: "unused".into(),
            model: "fal-ai/flux/dev".into(),
        },
        prompt_mode: PromptMode::ThemeWithStep,
        style_prompt: "pastel".into(),
        fetch_timeout: Duration::from_secs(5),
        retry: RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_backoff(Duration::ZERO, Duration::ZERO),
        on_step_failure,
    }
}

fn pipeline(images: Arc<FakeImages>, config: &ImageConfig, runs_dir: &Path) -> ClipPipeline {
    pipeline_with_encoder(images, config, runs_dir, SlideshowConfig::default())
}

fn pipeline_with_encoder(
    images: Arc<FakeImages>,
    config: &ImageConfig,
    runs_dir: &Path,
    slideshow: SlideshowConfig,
) -> ClipPipeline {
    let steps = StepGenerator::new(Arc::new(FakeChat), &ChatConfig::new("test-key"));
    let images = ImageSetGenerator::new(images, Arc::new(StubComposer), config);
    ClipPipeline::new(
        steps,
        images,
        SlideshowAssembler::new(slideshow),
        PathBuf::from("assets/audio.mp3"),
        runs_dir.to_path_buf(),
    )
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[tokio::test]
async fn test_stills_run_delivers_every_step_in_order() {
    let runs = TempDir::new().unwrap();
    let images = Arc::new(FakeImages::ok());
    let config = image_config(StepFailurePolicy::Skip, 3);
    let pipeline = pipeline(images.clone(), &config, runs.path());
    let delivery = CapturingDelivery::default();

    let report = pipeline
        .run(42, RunMode::Stills, &delivery, RunObservers::default())
        .await
        .unwrap();

    assert_eq!(report.activity, "Meditation for Inner Peace");
    assert_eq!(report.steps, 4);
    assert_eq!(report.stills, 4);
    assert!(!report.video);

    let stills = delivery.stills.lock().unwrap();
    let indices: Vec<_> = stills.iter().map(|s| s.index).collect();
    assert_eq!(indices, [0, 1, 2, 3]);
    assert_eq!(stills[0].caption, "Find a quiet place.");
    assert!(delivery.present.lock().unwrap().iter().all(|p| *p));
    assert!(delivery.videos.lock().unwrap().is_empty());

    assert_eq!(images.attempts(), 4);
    assert_eq!(images.attempts_for("pastel. Take your NAD+ supplement."), 1);
    assert!(is_empty_dir(runs.path()));
}

#[tokio::test]
async fn test_failed_step_is_skipped() {
    let runs = TempDir::new().unwrap();
    let images = Arc::new(FakeImages::failing(Some("NAD+"), Failure::Retryable));
    let config = image_config(StepFailurePolicy::Skip, 3);
    let pipeline = pipeline(images.clone(), &config, runs.path());
    let delivery = CapturingDelivery::default();

    let report = pipeline
        .run(42, RunMode::Stills, &delivery, RunObservers::default())
        .await
        .unwrap();

    assert_eq!(report.stills, 3);
    let indices: Vec<_> = delivery
        .stills
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.index)
        .collect();
    assert_eq!(indices, [0, 1, 3]);
    assert_eq!(images.attempts_for("NAD+"), 3);
    assert!(is_empty_dir(runs.path()));
}

#[tokio::test]
async fn test_all_steps_failing_yields_no_images() {
    let runs = TempDir::new().unwrap();
    let images = Arc::new(FakeImages::failing(Some("pastel"), Failure::Retryable));
    let config = image_config(StepFailurePolicy::Skip, 2);
    let pipeline = pipeline(images.clone(), &config, runs.path());
    let delivery = CapturingDelivery::default();

    let err = pipeline
        .run(42, RunMode::StillsAndVideo, &delivery, RunObservers::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoImages));
    assert_eq!(images.attempts(), 8);
    assert!(delivery.stills.lock().unwrap().is_empty());
    assert!(delivery.videos.lock().unwrap().is_empty());
    assert!(is_empty_dir(runs.path()));
}

#[tokio::test]
async fn test_abort_policy_stops_at_failed_step() {
    let runs = TempDir::new().unwrap();
    let images = Arc::new(FakeImages::failing(Some("Breathe"), Failure::Retryable));
    let config = image_config(StepFailurePolicy::Abort, 2);
    let pipeline = pipeline(images.clone(), &config, runs.path());
    let delivery = CapturingDelivery::default();

    let err = pipeline
        .run(42, RunMode::Stills, &delivery, RunObservers::default())
        .await
        .unwrap_err();

    match err {
        PipelineError::StepFailed { index, label, .. } => {
            assert_eq!(index, 1);
            assert_eq!(label, "Step 2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(images.attempts_for("NAD+"), 0);
    assert_eq!(images.attempts_for("stillness"), 0);
    assert!(delivery.stills.lock().unwrap().is_empty());
    assert!(is_empty_dir(runs.path()));
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let runs = TempDir::new().unwrap();
    let images = Arc::new(FakeImages::failing(Some("quiet"), Failure::Permanent));
    let config = image_config(StepFailurePolicy::Skip, 5);
    let pipeline = pipeline(images.clone(), &config, runs.path());
    let delivery = CapturingDelivery::default();

    let report = pipeline
        .run(42, RunMode::Stills, &delivery, RunObservers::default())
        .await
        .unwrap();

    assert_eq!(report.stills, 3);
    assert_eq!(images.attempts_for("quiet"), 1);
}

#[tokio::test]
async fn test_delivered_stills_feed_one_video_output() {
    let runs = TempDir::new().unwrap();
    let images = Arc::new(FakeImages::ok());
    let config = image_config(StepFailurePolicy::Skip, 1);
    let pipeline = pipeline(images, &config, runs.path());
    let delivery = CapturingDelivery::default();

    pipeline
        .run(7, RunMode::Stills, &delivery, RunObservers::default())
        .await
        .unwrap();

    let stills: Vec<PathBuf> = delivery
        .stills
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.path.clone())
        .collect();
    let args = build_args(
        &stills,
        Path::new("assets/audio.mp3"),
        Path::new("/tmp/out.mp4"),
        &SlideshowConfig::default(),
    );

    let inputs = args.iter().filter(|a| *a == "-i").count();
    assert_eq!(inputs, stills.len() + 1);
    let mp4s = args
        .iter()
        .filter(|a| a.to_string_lossy().ends_with(".mp4"))
        .count();
    assert_eq!(mp4s, 1);
}

#[tokio::test]
async fn test_one_run_per_chat() {
    let runs = TempDir::new().unwrap();
    let config = image_config(StepFailurePolicy::Skip, 1);
    let state = create_shared_state(pipeline(Arc::new(FakeImages::ok()), &config, runs.path()));

    assert!(state.begin_run(1).await.is_ok());
    assert!(matches!(state.begin_run(1).await, Err(PipelineError::Busy)));
    assert!(state.begin_run(2).await.is_ok());
    assert!(state.is_running(1).await);
    assert_eq!(state.active_count().await, 2);

    state.finish_run(1).await;
    assert!(!state.is_running(1).await);
    assert!(state.begin_run(1).await.is_ok());
}

/// Write an executable shell script standing in for ffmpeg.
#[cfg(unix)]
fn fake_encoder(dir: &Path, body: &str) -> SlideshowConfig {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    SlideshowConfig {
        ffmpeg_path: path,
        ..SlideshowConfig::default()
    }
}

#[derive(Default)]
struct CountingProgress {
    updates: Mutex<Vec<Duration>>,
    finished: Mutex<bool>,
}

impl ProgressObserver for CountingProgress {
    fn on_progress(&self, out_time: Duration) {
        self.updates.lock().unwrap().push(out_time);
    }

    fn on_finished(&self) {
        *self.finished.lock().unwrap() = true;
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_video_run_delivers_stills_then_one_video() {
    let runs = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let encoder = fake_encoder(
        bin.path(),
        "for last; do :; done\n\
         printf 'mp4' > \"$last\"\n\
         echo out_time_ms=1500000\n\
         echo progress=end\n",
    );
    let config = image_config(StepFailurePolicy::Skip, 1);
    let pipeline = pipeline_with_encoder(Arc::new(FakeImages::ok()), &config, runs.path(), encoder);
    let delivery = CapturingDelivery::default();
    let progress = CountingProgress::default();
    let observers = RunObservers {
        steps: None,
        encoding: Some(&progress),
    };

    let report = pipeline
        .run(9, RunMode::StillsAndVideo, &delivery, observers)
        .await
        .unwrap();

    assert!(report.video);
    assert_eq!(report.stills, 4);
    assert_eq!(delivery.stills.lock().unwrap().len(), 4);

    let videos = delivery.videos.lock().unwrap();
    assert_eq!(videos.len(), 1);
    assert!(videos[0].ends_with("slideshow.mp4"));
    assert_eq!(*delivery.video_present.lock().unwrap(), [true]);

    assert_eq!(*progress.updates.lock().unwrap(), [Duration::from_millis(1500)]);
    assert!(*progress.finished.lock().unwrap());

    assert!(!videos[0].exists());
    assert!(is_empty_dir(runs.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_encoder_failure_still_cleans_up() {
    let runs = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let encoder = fake_encoder(bin.path(), "echo 'Invalid filtergraph' >&2\nexit 1\n");
    let config = image_config(StepFailurePolicy::Skip, 1);
    let pipeline = pipeline_with_encoder(Arc::new(FakeImages::ok()), &config, runs.path(), encoder);
    let delivery = CapturingDelivery::default();

    let err = pipeline
        .run(9, RunMode::StillsAndVideo, &delivery, RunObservers::default())
        .await
        .unwrap_err();

    match err {
        PipelineError::Media(MediaError::EncoderFailed { stderr, .. }) => {
            assert!(stderr.contains("Invalid filtergraph"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(delivery.stills.lock().unwrap().len(), 4);
    assert!(delivery.videos.lock().unwrap().is_empty());
    assert!(is_empty_dir(runs.path()));
}
