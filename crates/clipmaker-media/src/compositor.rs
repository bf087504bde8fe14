//! Still compositing: base image plus caption overlay.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clipmaker_core::{CaptionStyle, ImageSource};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use tracing::{debug, warn};
use usvg::fontdb;

use crate::caption::render_caption_svg;
use crate::error::{MediaError, Result};

/// Fetches base images and burns captions into them.
///
/// The font database is loaded once and shared by every still.
#[derive(Clone)]
pub struct Compositor {
    http: reqwest::Client,
    fontdb: Arc<fontdb::Database>,
    style: CaptionStyle,
    width: u32,
    height: u32,
}

impl Compositor {
    /// Create a compositor producing `width` x `height` stills.
    pub fn new(
        style: CaptionStyle,
        width: u32,
        height: u32,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| MediaError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            fontdb: Arc::new(load_fonts()),
            style,
            width,
            height,
        })
    }

    /// Produce one captioned PNG at `out_path`.
    pub async fn compose(
        &self,
        source: &ImageSource,
        caption: &str,
        out_path: &Path,
    ) -> Result<PathBuf> {
        let bytes = self.load(source).await?;
        let svg = render_caption_svg(self.width, self.height, caption, &self.style);

        let fontdb = Arc::clone(&self.fontdb);
        let (width, height) = (self.width, self.height);
        let out = out_path.to_path_buf();
        tokio::task::spawn_blocking(move || compose_png(&bytes, &svg, fontdb, width, height, &out))
            .await
            .map_err(|e| MediaError::Render(format!("compositing task failed: {}", e)))??;

        debug!(source = %source, path = %out_path.display(), "Composited still");
        Ok(out_path.to_path_buf())
    }

    async fn load(&self, source: &ImageSource) -> Result<Vec<u8>> {
        match source {
            ImageSource::Path(path) => Ok(tokio::fs::read(path).await?),
            ImageSource::Url(url) => {
                let fetch_err = |reason: String| MediaError::Fetch {
                    url: url.clone(),
                    reason,
                };
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| fetch_err(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(fetch_err(format!("HTTP {}", status)));
                }
                let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

fn load_fonts() -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    db.load_fonts_dir("assets/fonts");
    if db.len() == 0 {
        warn!("No fonts found; captions will render without text");
    }
    db
}

/// Decode, fit, overlay and write. Blocking.
fn compose_png(
    bytes: &[u8],
    svg: &str,
    fontdb: Arc<fontdb::Database>,
    width: u32,
    height: u32,
    out: &Path,
) -> Result<()> {
    let base = image::load_from_memory(bytes)?;
    let mut canvas = base.resize_to_fill(width, height, FilterType::Lanczos3).to_rgba8();

    let overlay = rasterize_svg(svg, fontdb, width, height)?;
    imageops::overlay(&mut canvas, &overlay, 0, 0);

    canvas.save_with_format(out, ImageFormat::Png)?;
    Ok(())
}

/// Rasterize an SVG document into a straight-alpha RGBA image.
pub fn rasterize_svg(
    svg: &str,
    fontdb: Arc<fontdb::Database>,
    width: u32,
    height: u32,
) -> Result<RgbaImage> {
    let opts = usvg::Options {
        fontdb,
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &opts).map_err(|e| MediaError::Render(e.to_string()))?;

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| MediaError::Render(format!("cannot allocate {}x{} pixmap", width, height)))?;
    let sx = width as f32 / tree.size().width();
    let sy = height as f32 / tree.size().height();
    resvg::render(&tree, Transform::from_scale(sx, sy), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied pixels; image expects straight alpha.
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| MediaError::Render("pixmap size mismatch".into()))
}
