//! Per-run scratch directory.
//!
//! Every file a run produces (stills, the video) lives under one directory named
//! after the run id. The directory is removed recursively when the workspace is
//! closed or dropped, so concurrent runs never share file names and an aborted run
//! leaves nothing behind.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::models::RunId;

/// Maximum length of the label part of a still's file name.
const MAX_LABEL_LEN: usize = 32;

/// Scoped temporary directory owned by one run.
#[derive(Debug)]
pub struct RunWorkspace {
    run_id: RunId,
    dir: TempDir,
}

impl RunWorkspace {
    /// Create a fresh workspace under `base`, creating `base` if needed.
    pub fn create(base: &Path, run_id: RunId) -> std::io::Result<Self> {
        std::fs::create_dir_all(base)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("clipmaker-{}-", run_id.short()))
            .tempdir_in(base)?;
        debug!(run_id = %run_id, path = %dir.path().display(), "Created run workspace");
        Ok(Self { run_id, dir })
    }

    /// Root directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Output path for the still of step `index`.
    ///
    /// The index prefix keeps files sorted in narration order.
    pub fn still_path(&self, index: usize, label: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("slide-{:02}-{}.png", index, sanitize_label(label)))
    }

    /// Output path for the assembled video.
    pub fn video_path(&self) -> PathBuf {
        self.dir.path().join("slideshow.mp4")
    }

    /// Remove the workspace now and report failures.
    ///
    /// Dropping the workspace also removes it, but silently.
    pub fn close(self) -> std::io::Result<()> {
        let run_id = self.run_id;
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => {
                debug!(run_id = %run_id, path = %path.display(), "Removed run workspace");
                Ok(())
            }
            Err(e) => {
                warn!(run_id = %run_id, path = %path.display(), error = %e, "Failed to remove run workspace");
                Err(e)
            }
        }
    }
}

/// Turn a step label into a file-name-safe slug.
fn sanitize_label(label: &str) -> String {
    let slug: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(MAX_LABEL_LEN)
        .collect();

    if slug.is_empty() {
        "step".to_string()
    } else {
        slug
    }
}
