//! Crossfade slideshow encoding with ffmpeg.
//!
//! Each still is looped for a fixed duration and faded in over the previous
//! ones, two seconds apart. The audio track is the last input and the output is
//! cut to the shorter of the video and audio streams.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use clipmaker_core::{SlideshowConfig, SlideshowOutput};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, trace};

use crate::error::{MediaError, Result};

/// Seconds between the starts of consecutive slides.
pub const SLIDE_OFFSET_SECS: u32 = 2;

/// Length of each fade-in.
pub const FADE_SECS: u32 = 1;

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Receives encoder progress.
pub trait ProgressObserver: Send + Sync {
    /// Called whenever the encoder reports its output position.
    fn on_progress(&self, out_time: Duration);

    /// Called once when the encoder reports completion.
    fn on_finished(&self) {}
}

/// Fade and duration arithmetic for a slideshow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    slides: usize,
    slide_seconds: u32,
}

impl Timeline {
    pub fn new(slides: usize, slide_seconds: u32) -> Self {
        Self {
            slides,
            slide_seconds,
        }
    }

    /// Fade-in window `(start, end)` of slide `index`, in seconds.
    ///
    /// The first slide is the background and has no fade.
    pub fn fade_in(&self, index: usize) -> Option<(f64, f64)> {
        if index == 0 || index >= self.slides {
            return None;
        }
        let start = f64::from(SLIDE_OFFSET_SECS) * index as f64;
        Some((start, start + f64::from(FADE_SECS)))
    }

    /// Time at which the last slide is fully visible.
    pub fn last_fade_end(&self) -> f64 {
        self.slides
            .checked_sub(1)
            .and_then(|last| self.fade_in(last))
            .map_or(0.0, |(_, end)| end)
    }

    /// Length of the video track before `-shortest` applies.
    pub fn video_duration(&self) -> f64 {
        let last_start = f64::from(SLIDE_OFFSET_SECS) * self.slides.saturating_sub(1) as f64;
        last_start + f64::from(self.slide_seconds)
    }

    /// Length of the output given an audio track of `audio_seconds`.
    pub fn output_duration(&self, audio_seconds: f64) -> f64 {
        self.video_duration().min(audio_seconds)
    }
}

/// Build the `-filter_complex` graph for `count` stills cropped to `width` x `height`.
pub fn build_filter_graph(count: usize, width: u32, height: u32) -> String {
    let mut graph = String::new();
    let mut chain = String::from("[0]");

    for i in 1..count {
        graph.push_str(&format!(
            "[{i}]fade=d={FADE_SECS}:t=in:alpha=1,setpts=PTS-STARTPTS+{}/TB[f{}]; ",
            i as u32 * SLIDE_OFFSET_SECS,
            i - 1
        ));
        chain.push_str(&format!("[f{}]overlay", i - 1));
        if i < count - 1 {
            chain.push_str(&format!("[bg{i}];[bg{i}]"));
        }
    }

    let crop = format!("crop={width}:{height}:in_w/2-240:in_h/2-240,format=yuv420p[v]");
    if count > 1 {
        graph.push_str(&format!("{chain},{crop}"));
    } else {
        graph.push_str(&format!("{chain}{crop}"));
    }
    graph
}

/// Full ffmpeg argument list for one slideshow.
pub fn build_args(
    stills: &[PathBuf],
    audio: &Path,
    output: &Path,
    config: &SlideshowConfig,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-nostats"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.extend(["-progress", "pipe:1"].map(OsString::from));

    for still in stills {
        args.extend(["-loop", "1", "-t"].map(OsString::from));
        args.push(config.slide_seconds.to_string().into());
        args.push("-i".into());
        args.push(still.into());
    }
    args.push("-i".into());
    args.push(audio.into());

    args.push("-filter_complex".into());
    args.push(build_filter_graph(stills.len(), config.width, config.height).into());
    args.extend(["-map", "[v]", "-map"].map(OsString::from));
    args.push(format!("{}:a", stills.len()).into());
    args.push("-c:a".into());
    args.push(config.audio_codec.as_str().into());
    args.push("-shortest".into());
    args.push("-r".into());
    args.push(config.fps.to_string().into());
    args.push(output.into());
    args
}

/// One parsed line of `-progress` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    OutTime(Duration),
    End,
}

/// Parse a `key=value` line from ffmpeg's progress stream.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // Despite the name, ffmpeg reports microseconds here.
        "out_time_ms" => value
            .parse::<u64>()
            .ok()
            .map(|us| ProgressEvent::OutTime(Duration::from_micros(us))),
        "progress" if value == "end" => Some(ProgressEvent::End),
        _ => None,
    }
}

/// Last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Runs ffmpeg to turn stills plus audio into an MP4.
#[derive(Debug, Clone)]
pub struct SlideshowAssembler {
    config: SlideshowConfig,
}

impl SlideshowAssembler {
    pub fn new(config: SlideshowConfig) -> Self {
        Self { config }
    }

    /// Resolve the configured encoder binary.
    pub fn locate_ffmpeg(&self) -> Result<PathBuf> {
        which::which(&self.config.ffmpeg_path).map_err(|e| {
            MediaError::FfmpegNotFound(format!("{}: {}", self.config.ffmpeg_path.display(), e))
        })
    }

    /// Encode `stills` (in order) with `audio` into `output`.
    pub async fn assemble(
        &self,
        stills: &[PathBuf],
        audio: &Path,
        output: &Path,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<SlideshowOutput> {
        if stills.is_empty() {
            return Err(MediaError::NoStills);
        }
        let ffmpeg = self.locate_ffmpeg()?;

        let timeline = Timeline::new(stills.len(), self.config.slide_seconds);
        info!(
            stills = stills.len(),
            video_seconds = timeline.video_duration(),
            output = %output.display(),
            "Assembling slideshow"
        );

        let args = build_args(stills, audio, output, &self.config);
        debug!(ffmpeg = %ffmpeg.display(), ?args, "Spawning ffmpeg");

        let mut child = Command::new(&ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_progress_line(&line) {
                    Some(ProgressEvent::OutTime(t)) => {
                        trace!(out_time_ms = t.as_millis() as u64, "Encoder progress");
                        if let Some(obs) = observer {
                            obs.on_progress(t);
                        }
                    }
                    Some(ProgressEvent::End) => {
                        if let Some(obs) = observer {
                            obs.on_finished();
                        }
                    }
                    None => {}
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(MediaError::EncoderFailed {
                status: status.to_string(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        info!(output = %output.display(), "Slideshow encoded");
        Ok(SlideshowOutput {
            path: output.to_path_buf(),
        })
    }
}
