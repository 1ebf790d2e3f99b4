//! # Parameter Planner Module
//!
//! Il cuore euristico del bridge: dai dati della traccia sorgente e dalla richiesta
//! ricava risoluzione, frame rate e bitrate del video compresso.
//!
//! ## Responsabilità:
//! - Deserializza la richiesta `compressVideo` (`CompressionRequest`)
//! - Ridimensiona mantenendo l'aspect ratio, con il lato minore limitato a `maxSizeMinor`
//! - Limita il frame rate sorgente all'intervallo [24, 120]
//! - Stima il bitrate: `larghezza × altezza × fps × moltiplicatore × 0.07`
//! - Produce le impostazioni di output per l'encoder (H.264 main, AAC)
//!
//! ## Note di comportamento:
//! - Se entrambi i lati superano il limite e l'altezza è maggiore della larghezza,
//!   la larghezza diventa `limite - 1` (comportamento storico, mantenuto)
//! - Il `frameRate` della richiesta è accettato ma non viene mai applicato all'encoder
//! - Con orientamento non landscape (incluso `unknown`) larghezza e altezza naturali
//!   vengono scambiate prima del calcolo

use crate::composition::TimeRange;
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::orientation;
use crate::probe::SourceAsset;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tracing::debug;

pub const MIN_FRAME_RATE: f64 = 24.0;
pub const MAX_FRAME_RATE: f64 = 120.0;
/// Bits per pixel per frame at multiplier 1.0
pub const BITS_PER_PIXEL: f64 = 0.07;
/// Stand-in for a missing or zero natural dimension
pub const PLACEHOLDER_DIMENSION: f64 = 480.0;

/// Export quality preset (1 = low, 2 = medium, 3 = highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Quality {
    Low,
    Medium,
    Highest,
}

impl From<i64> for Quality {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::Low,
            3 => Self::Highest,
            _ => Self::Medium,
        }
    }
}

impl From<Quality> for i64 {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Low => 1,
            Quality::Medium => 2,
            Quality::Highest => 3,
        }
    }
}

impl Quality {
    /// x264 speed preset used for this quality level
    pub fn encoder_preset(&self) -> &'static str {
        match self {
            Self::Low => "veryfast",
            Self::Medium => "medium",
            Self::Highest => "slow",
        }
    }
}

/// Arguments of one `compressVideo` call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionRequest {
    #[serde(rename = "path")]
    pub source_path: PathBuf,
    #[serde(default = "default_quality")]
    pub quality: Quality,
    #[serde(default)]
    pub delete_origin: bool,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub include_audio: Option<bool>,
    /// Accepted for compatibility; the encoder keeps the source rate
    #[serde(default, rename = "frameRate")]
    pub frame_rate_hint: Option<f64>,
    #[serde(default, rename = "maxSizeMinor", deserialize_with = "whole_pixels")]
    pub max_minor_dimension: Option<u32>,
    #[serde(default)]
    pub bit_rate_multiplier: Option<f64>,
}

fn default_quality() -> Quality {
    Quality::Medium
}

/// Any JSON number, rounded to whole pixels (`720.0` is 720)
fn whole_pixels<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) if value.is_finite() && (0.0..=u32::MAX as f64).contains(&value) => {
            Ok(Some(value.round() as u32))
        }
        Some(value) => Err(de::Error::custom(format!("maxSizeMinor out of range: {}", value))),
    }
}

impl CompressionRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            quality: Quality::Medium,
            delete_origin: false,
            start_time: None,
            duration: None,
            include_audio: None,
            frame_rate_hint: None,
            max_minor_dimension: None,
            bit_rate_multiplier: None,
        }
    }

    pub fn include_audio(&self) -> bool {
        self.include_audio.unwrap_or(true)
    }
}

/// Video encoder settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoOutputSettings {
    pub codec: &'static str,
    pub profile: &'static str,
    pub width: u32,
    pub height: u32,
    pub average_bit_rate: u64,
    pub preset: &'static str,
}

/// Audio encoder settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioOutputSettings {
    pub codec: &'static str,
    pub bit_rate: u32,
    pub channels: u8,
    pub sample_rate: u32,
}

/// Everything derived for one export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscodePlan {
    pub target_width: u32,
    pub target_height: u32,
    pub target_bit_rate: u64,
    pub clamped_frame_rate: f64,
    pub time_range: TimeRange,
    pub include_audio: bool,
    pub optimize_for_network_use: bool,
    pub video: VideoOutputSettings,
    pub audio: AudioOutputSettings,
}

/// Derives a [`TranscodePlan`] from a request and the probed source
#[derive(Debug, Clone)]
pub struct ParameterPlanner {
    default_max_minor: u32,
    default_bit_rate_multiplier: f64,
    audio: AudioOutputSettings,
    optimize_for_network_use: bool,
}

impl ParameterPlanner {
    pub fn new(config: &Config) -> Self {
        Self {
            default_max_minor: config.default_max_minor,
            default_bit_rate_multiplier: config.default_bit_rate_multiplier,
            audio: AudioOutputSettings {
                codec: "aac",
                bit_rate: config.audio_bit_rate,
                channels: config.audio_channels,
                sample_rate: config.audio_sample_rate,
            },
            optimize_for_network_use: config.optimize_for_network_use,
        }
    }

    pub fn plan(&self, request: &CompressionRequest, asset: &SourceAsset) -> Result<TranscodePlan> {
        let track = asset.video_track.as_ref().ok_or_else(|| {
            CompressError::SourceUnreadable(format!("No video track in {}", asset.path.display()))
        })?;

        let (orientation, _) = orientation::resolve(Some(&track.preferred_transform));
        let natural_width = or_placeholder(track.natural_width);
        let natural_height = or_placeholder(track.natural_height);
        let (original_width, original_height) = if orientation.is_landscape() {
            (natural_width, natural_height)
        } else {
            (natural_height, natural_width)
        };

        let minor = request.max_minor_dimension.unwrap_or(self.default_max_minor);
        if minor < 2 {
            return Err(CompressError::InvalidArgument(format!(
                "maxSizeMinor must be at least 2, got {}",
                minor
            )));
        }
        let (width, height) = target_dimensions(original_width, original_height, minor);

        let frame_rate = clamp_frame_rate(track.source_frame_rate());
        let multiplier = request
            .bit_rate_multiplier
            .unwrap_or(self.default_bit_rate_multiplier);
        if !(multiplier > 0.0) || !multiplier.is_finite() {
            return Err(CompressError::InvalidArgument(format!(
                "bitRateMultiplier must be a positive number, got {}",
                multiplier
            )));
        }
        let bit_rate = estimate_bit_rate(width, height, frame_rate, multiplier);
        if bit_rate == 0 {
            return Err(CompressError::InvalidArgument(format!(
                "bitRateMultiplier {} yields a zero bitrate for {}x{}",
                multiplier, width, height
            )));
        }

        if request.frame_rate_hint.is_some() {
            debug!("Ignoring frame rate hint {:?}, keeping the source rate", request.frame_rate_hint);
        }

        let time_range = TimeRange::resolve(
            request.start_time,
            request.duration,
            asset.duration_seconds,
            asset.timescale,
        );

        debug!(
            "Planned {}: {}x{} -> {}x{} @ {:.2} fps, {} bps ({:?})",
            asset.path.display(),
            original_width,
            original_height,
            width,
            height,
            frame_rate,
            bit_rate,
            orientation
        );

        Ok(TranscodePlan {
            target_width: width,
            target_height: height,
            target_bit_rate: bit_rate,
            clamped_frame_rate: frame_rate,
            time_range,
            include_audio: request.include_audio(),
            optimize_for_network_use: self.optimize_for_network_use,
            video: VideoOutputSettings {
                codec: "h264",
                profile: "main",
                width,
                height,
                average_bit_rate: bit_rate,
                preset: request.quality.encoder_preset(),
            },
            audio: self.audio.clone(),
        })
    }
}

fn or_placeholder(dimension: f64) -> f64 {
    if dimension.is_finite() && dimension > 0.0 {
        dimension
    } else {
        PLACEHOLDER_DIMENSION
    }
}

/// Scale `width x height` so the shorter side lands on `minor`.
///
/// Only applies when both sides exceed `minor`; otherwise the rounded
/// originals are returned.
pub fn target_dimensions(width: f64, height: f64, minor: u32) -> (u32, u32) {
    let resized_minor = minor as f64;
    let mut new_width = width.round() as u32;
    let mut new_height = height.round() as u32;

    if height > resized_minor && width > resized_minor {
        if height > width {
            new_width = minor - 1;
            new_height = (height * (resized_minor / width)).round() as u32;
        } else {
            new_height = minor;
            new_width = (width * (resized_minor / height)).round() as u32;
        }
    }

    (new_width, new_height)
}

/// Clamp a source frame rate into `[24, 120]`; NaN maps to 24
pub fn clamp_frame_rate(frame_rate: f64) -> f64 {
    if frame_rate.is_nan() {
        return MIN_FRAME_RATE;
    }
    frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE)
}

pub fn estimate_bit_rate(width: u32, height: u32, frame_rate: f64, multiplier: f64) -> u64 {
    let pixels = (height as u64 * width as u64) as f64;
    (pixels * frame_rate * multiplier * BITS_PER_PIXEL).round() as u64
}
