//! # Thumbnail Module
//!
//! Estrazione di un frame e encoding JPEG per `getByteThumbnail` / `getFileThumbnail`.
//!
//! ## Responsabilità:
//! - Definisce il trait `FrameGrabber` (frame a una posizione, con la rotazione già applicata)
//! - Encoding JPEG con qualità 1-100 tramite `image`
//! - Scrittura del thumbnail in `<cache>/<nome>.jpg`, rimuovendo prima il file stale

use crate::cache::CacheDir;
use crate::error::{CompressError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Grabs a single display-oriented frame from a video
pub trait FrameGrabber: Send + Sync + 'static {
    /// `Ok(None)` when the file has no frame at that position
    fn grab_frame(&self, path: &Path, position_seconds: f64) -> impl Future<Output = Result<Option<DynamicImage>>> + Send;
}

/// Encode `image` as JPEG; `quality` is clamped into `1..=100`
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| CompressError::ThumbnailEncodeFailed(e.to_string()))?;
    Ok(buffer)
}

pub struct ThumbnailService<G> {
    grabber: Arc<G>,
    cache: CacheDir,
}

impl<G: FrameGrabber> ThumbnailService<G> {
    pub fn new(grabber: Arc<G>, cache: CacheDir) -> Self {
        Self { grabber, cache }
    }

    /// JPEG bytes of the frame at `position_seconds`
    pub async fn bytes(&self, path: &Path, quality: u8, position_seconds: f64) -> Result<Option<Vec<u8>>> {
        let position = if position_seconds.is_finite() { position_seconds.max(0.0) } else { 0.0 };
        match self.grabber.grab_frame(path, position).await? {
            Some(frame) => Ok(Some(encode_jpeg(&frame, quality)?)),
            None => {
                debug!("No frame at {:.3}s in {}", position, path.display());
                Ok(None)
            }
        }
    }

    /// Write the thumbnail into the cache and return its path
    pub async fn file(&self, path: &Path, quality: u8, position_seconds: f64) -> Result<Option<PathBuf>> {
        let target = self.cache.output_path_for(path, "jpg")?;
        self.cache.ensure().await?;
        CacheDir::remove_file_if_exists(&target).await?;

        let Some(bytes) = self.bytes(path, quality, position_seconds).await? else {
            return Ok(None);
        };

        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| CompressError::WriteFailed(format!("getFileThumbnail error: {}: {}", target.display(), e)))?;
        debug!("Thumbnail written to {} ({})", target.display(), CacheDir::format_size(bytes.len() as u64));
        Ok(Some(target))
    }
}
