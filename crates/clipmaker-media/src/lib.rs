//! Media processing for Clipmaker.
//!
//! - **caption**: word-wrapped SVG caption overlays
//! - **compositor**: fetch a generated image, fit it to the canvas and burn in the caption
//! - **slideshow**: ffmpeg crossfade slideshow with an audio track

pub mod caption;
pub mod compositor;
pub mod error;
pub mod slideshow;

pub use caption::{estimate_width, render_caption_svg, wrap_lines};
pub use compositor::Compositor;
pub use error::{MediaError, Result};
pub use slideshow::{
    build_args, build_filter_graph, ProgressObserver, SlideshowAssembler, Timeline,
};
