//! Error types for the media crate.

use thiserror::Error;

/// Errors from compositing stills and encoding the slideshow.
#[derive(Error, Debug)]
pub enum MediaError {
    /// The source image could not be downloaded.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// URL that was requested.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The HTTP client for fetching images could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The image could not be decoded or the PNG could not be written.
    #[error("image processing failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The caption overlay could not be rasterized.
    #[error("caption render failed: {0}")]
    Render(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The encoder binary is not available.
    #[error("ffmpeg not found ({0}); install it or set CLIPMAKER_FFMPEG")]
    FfmpegNotFound(String),

    /// The encoder exited unsuccessfully.
    #[error("ffmpeg failed with {status}: {stderr}")]
    EncoderFailed {
        /// Exit status as reported by the OS.
        status: String,
        /// Last lines of the encoder's stderr.
        stderr: String,
    },

    /// A slideshow needs at least one still.
    #[error("no stills to assemble")]
    NoStills,
}

/// Result type for media operations.
pub type Result<T> = std::result::Result<T, MediaError>;
