//! # Media Probe Module
//!
//! Snapshot immutabile delle proprietà di un asset video, letto da un probe esterno.
//!
//! ## Responsabilità:
//! - Definisce `SourceAsset` e `TrackGeometry` (dimensioni naturali, trasformazione,
//!   frame rate, durata, dimensione dei sample)
//! - Definisce il trait `MediaProbe` implementato dai backend (es. ffprobe)
//!
//! Il probe è una black box: il bridge non legge mai direttamente i container.

use crate::error::Result;
use crate::orientation::AffineTransform;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Duration of one frame as a rational `value / timescale` seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDuration {
    pub value: i64,
    pub timescale: i64,
}

impl FrameDuration {
    /// Frames per second, `None` when the duration is degenerate
    pub fn frame_rate(&self) -> Option<f64> {
        if self.value <= 0 || self.timescale <= 0 {
            return None;
        }
        Some(self.timescale as f64 / self.value as f64)
    }
}

/// Geometry and timing of the first video track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackGeometry {
    pub natural_width: f64,
    pub natural_height: f64,
    pub preferred_transform: AffineTransform,
    pub nominal_frame_rate: f64,
    /// Frame duration of a composition built over the asset, if known
    pub frame_duration: Option<FrameDuration>,
    pub total_sample_data_length: u64,
}

impl TrackGeometry {
    /// Source frame rate, preferring the composition frame duration
    pub fn source_frame_rate(&self) -> f64 {
        self.frame_duration
            .and_then(|fd| fd.frame_rate())
            .unwrap_or(self.nominal_frame_rate)
    }
}

/// Descriptive metadata carried by the container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Everything the planner and the media info need to know about one file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAsset {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub timescale: i64,
    pub video_track: Option<TrackGeometry>,
    pub metadata: AssetMetadata,
}

/// Reads a [`SourceAsset`] from a file
pub trait MediaProbe: Send + Sync + 'static {
    fn probe(&self, path: &Path) -> impl Future<Output = Result<SourceAsset>> + Send;
}
