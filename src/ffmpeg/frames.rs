//! `FrameGrabber` that asks `ffmpeg` for a single PNG frame on stdout.

use crate::args;
use crate::error::{CompressError, Result};
use crate::thumbnail::FrameGrabber;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

pub struct FfmpegFrameGrabber {
    ffmpeg: PathBuf,
}

impl FfmpegFrameGrabber {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into() }
    }
}

/// Arguments grabbing one frame at `position_seconds`; ffmpeg applies the display rotation itself
pub fn grab_args(path: &Path, position_seconds: f64) -> Vec<String> {
    args![
        "-hide_banner",
        "-nostdin",
        "-loglevel",
        "error",
        "-ss",
        format!("{:.3}", position_seconds),
        "-i",
        path.to_string_lossy(),
        "-frames:v",
        1,
        "-f",
        "image2pipe",
        "-c:v",
        "png",
        "-",
    ]
}

impl FrameGrabber for FfmpegFrameGrabber {
    async fn grab_frame(&self, path: &Path, position_seconds: f64) -> Result<Option<DynamicImage>> {
        let output = Command::new(&self.ffmpeg)
            .args(grab_args(path, position_seconds))
            .output()
            .await
            .map_err(|e| CompressError::MissingDependency(format!("Failed to execute {}: {}", self.ffmpeg.display(), e)))?;

        if !output.status.success() {
            return Err(CompressError::SourceUnreadable(format!(
                "Failed to grab a frame from {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // Seeking past the end succeeds with no frame written
        if output.stdout.is_empty() {
            debug!("No frame at {:.3}s in {}", position_seconds, path.display());
            return Ok(None);
        }

        let frame = image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .map_err(|e| CompressError::ThumbnailEncodeFailed(format!("Invalid frame from ffmpeg: {}", e)))?;
        Ok(Some(frame))
    }
}
