//! # Composition Module
//!
//! Decide cosa viene dato in input all'engine di export.
//!
//! ## Responsabilità:
//! - Calcola l'intervallo temporale richiesto (`TimeRange`) limitato alla durata sorgente
//! - Con audio: passa l'asset originale invariato (nessun trim)
//! - Senza audio: costruisce una composizione solo video, con la trasformazione
//!   della traccia sorgente e l'intervallo inserito a partire da zero

use crate::error::{CompressError, Result};
use crate::orientation::AffineTransform;
use crate::probe::SourceAsset;
use serde::Serialize;
use std::path::PathBuf;

/// Portion of the source to export, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub duration: f64,
}

impl TimeRange {
    /// Resolve the requested window against the source duration.
    ///
    /// `start` defaults to 0 and is kept inside the source; `duration`
    /// defaults to the whole source and is capped so the window never runs
    /// past the end. Both are quantised to `timescale` ticks when one is known.
    pub fn resolve(start: Option<f64>, duration: Option<f64>, source_duration: f64, timescale: i64) -> Self {
        let source_duration = if source_duration.is_finite() { source_duration.max(0.0) } else { 0.0 };
        let start = start
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, source_duration);

        let requested = duration
            .filter(|d| d.is_finite())
            .unwrap_or(source_duration)
            .max(0.0);
        let duration = if start + requested <= source_duration {
            requested
        } else {
            source_duration - start
        };

        Self {
            start: quantize(start, timescale),
            duration: quantize(duration, timescale),
        }
    }
}

fn quantize(seconds: f64, timescale: i64) -> f64 {
    if timescale <= 0 {
        return seconds;
    }
    let scale = timescale as f64;
    (seconds * scale).round() / scale
}

/// Input handed to the export engine
#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    /// The source asset as-is, audio included, no trimming
    Passthrough { source: PathBuf },
    /// A single video track over `time_range`, audio dropped
    VideoOnly {
        source: PathBuf,
        transform: AffineTransform,
        time_range: TimeRange,
    },
}

impl Composition {
    pub fn build(include_audio: bool, time_range: TimeRange, asset: &SourceAsset) -> Result<Self> {
        let track = asset.video_track.as_ref().ok_or_else(|| {
            CompressError::SourceUnreadable(format!("No video track in {}", asset.path.display()))
        })?;

        if include_audio {
            return Ok(Self::Passthrough { source: asset.path.clone() });
        }

        Ok(Self::VideoOnly {
            source: asset.path.clone(),
            transform: track.preferred_transform,
            time_range,
        })
    }

    pub fn source(&self) -> &PathBuf {
        match self {
            Self::Passthrough { source } | Self::VideoOnly { source, .. } => source,
        }
    }

    pub fn includes_audio(&self) -> bool {
        matches!(self, Self::Passthrough { .. })
    }

    /// Window the engine must trim to, only set for video-only compositions
    pub fn export_time_range(&self) -> Option<TimeRange> {
        match self {
            Self::Passthrough { .. } => None,
            Self::VideoOnly { time_range, .. } => Some(*time_range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::asset;

    #[test]
    fn test_time_range_defaults_to_whole_source() {
        let range = TimeRange::resolve(None, None, 12.5, 600);
        assert_eq!(range, TimeRange { start: 0.0, duration: 12.5 });
    }

    #[test]
    fn test_time_range_inside_source_is_kept() {
        let range = TimeRange::resolve(Some(2.0), Some(3.0), 10.0, 600);
        assert_eq!(range, TimeRange { start: 2.0, duration: 3.0 });
    }

    #[test]
    fn test_time_range_overrun_is_capped_to_remaining() {
        let range = TimeRange::resolve(Some(8.0), Some(5.0), 10.0, 600);
        assert_eq!(range, TimeRange { start: 8.0, duration: 2.0 });
    }

    #[test]
    fn test_time_range_clamps_negative_and_out_of_range_values() {
        let range = TimeRange::resolve(Some(-3.0), Some(-1.0), 10.0, 0);
        assert_eq!(range, TimeRange { start: 0.0, duration: 0.0 });

        let range = TimeRange::resolve(Some(42.0), None, 10.0, 0);
        assert_eq!(range, TimeRange { start: 10.0, duration: 0.0 });
    }

    #[test]
    fn test_time_range_is_quantised_to_timescale() {
        let range = TimeRange::resolve(Some(1.0004), Some(2.0), 10.0, 1000);
        assert_eq!(range.start, 1.0);
    }

    #[test]
    fn test_audio_included_passes_source_through() {
        let source = asset("/videos/clip.mov", 1920.0, 1080.0, AffineTransform::IDENTITY);
        let range = TimeRange::resolve(Some(1.0), Some(2.0), source.duration_seconds, source.timescale);
        let composition = Composition::build(true, range, &source).unwrap();

        assert!(composition.includes_audio());
        assert_eq!(composition.export_time_range(), None);
        assert_eq!(composition.source(), &PathBuf::from("/videos/clip.mov"));
    }

    #[test]
    fn test_video_only_keeps_transform_and_range() {
        let portrait = AffineTransform::from_clockwise_degrees(90);
        let source = asset("/videos/clip.mov", 1920.0, 1080.0, portrait);
        let range = TimeRange::resolve(Some(1.0), Some(2.0), source.duration_seconds, source.timescale);

        match Composition::build(false, range, &source).unwrap() {
            Composition::VideoOnly { transform, time_range, .. } => {
                assert_eq!(transform, portrait);
                assert_eq!(time_range, range);
            }
            other => panic!("expected a video-only composition, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_track_is_unreadable() {
        let mut source = asset("/videos/clip.mov", 1920.0, 1080.0, AffineTransform::IDENTITY);
        source.video_track = None;
        let range = TimeRange::resolve(None, None, 10.0, 600);

        let err = Composition::build(true, range, &source).unwrap_err();
        assert!(matches!(err, CompressError::SourceUnreadable(_)));
    }
}
