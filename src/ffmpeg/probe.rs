//! `MediaProbe` backed by `ffprobe -print_format json`.

use crate::error::{CompressError, Result};
use crate::orientation::AffineTransform;
use crate::probe::{AssetMetadata, FrameDuration, MediaProbe, SourceAsset, TrackGeometry};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Timescale used when the stream does not report a time base
const DEFAULT_TIMESCALE: i64 = 600;

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    time_base: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl ProbeStream {
    fn is_video(&self) -> bool {
        self.codec_type.as_deref() == Some("video") && self.disposition.get("attached_pic").copied().unwrap_or(0) == 0
    }

    /// Clockwise display rotation: the display matrix wins over the legacy `rotate` tag
    fn clockwise_rotation(&self) -> i64 {
        if let Some(rotation) = self.side_data_list.iter().find_map(|s| s.rotation) {
            return -(rotation.round() as i64);
        }
        tag(&self.tags, &["rotate"])
            .and_then(|r| r.trim().parse::<f64>().ok())
            .map(|r| r.round() as i64)
            .unwrap_or(0)
    }
}

fn tag(tags: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        tags.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    })
}

/// `"num/den"` as a pair, `None` when either side is not positive
fn parse_rational(value: &str) -> Option<(i64, i64)> {
    let (num, den) = value.split_once('/')?;
    let num = num.trim().parse::<i64>().ok()?;
    let den = den.trim().parse::<i64>().ok()?;
    (num > 0 && den > 0).then_some((num, den))
}

fn parse_number(value: Option<&String>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Build a [`SourceAsset`] from ffprobe JSON output
pub fn parse_probe_output(path: &Path, json: &str) -> Result<SourceAsset> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| CompressError::SourceUnreadable(format!("Invalid ffprobe output for {}: {}", path.display(), e)))?;

    let stream = output.streams.iter().find(|s| s.is_video());
    let duration_seconds = parse_number(output.format.duration.as_ref())
        .or_else(|| stream.and_then(|s| parse_number(s.duration.as_ref())))
        .unwrap_or(0.0)
        .max(0.0);

    let timescale = stream
        .and_then(|s| s.time_base.as_deref())
        .and_then(parse_rational)
        .map(|(num, den)| (den / num).max(1))
        .unwrap_or(DEFAULT_TIMESCALE);

    let video_track = stream.map(|s| {
        // r_frame_rate is the container's base rate, the closest thing to a frame duration
        let frame_duration = s
            .r_frame_rate
            .as_deref()
            .and_then(parse_rational)
            .map(|(num, den)| FrameDuration { value: den, timescale: num });
        let nominal_frame_rate = s
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rational)
            .map(|(num, den)| num as f64 / den as f64)
            .unwrap_or(0.0);

        let stream_duration = parse_number(s.duration.as_ref()).unwrap_or(duration_seconds);
        let total_sample_data_length = match parse_number(s.bit_rate.as_ref()) {
            Some(bit_rate) => (bit_rate * stream_duration / 8.0).round() as u64,
            None => parse_number(output.format.size.as_ref()).unwrap_or(0.0) as u64,
        };

        TrackGeometry {
            natural_width: s.width.unwrap_or(0) as f64,
            natural_height: s.height.unwrap_or(0) as f64,
            preferred_transform: AffineTransform::from_clockwise_degrees(s.clockwise_rotation()),
            nominal_frame_rate,
            frame_duration,
            total_sample_data_length,
        }
    });

    Ok(SourceAsset {
        path: path.to_path_buf(),
        duration_seconds,
        timescale,
        video_track,
        metadata: AssetMetadata {
            title: tag(&output.format.tags, &["title"]),
            author: tag(&output.format.tags, &["author", "artist"]),
        },
    })
}

pub struct FfprobeProbe {
    ffprobe: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffprobe: ffprobe.into() }
    }
}

impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<SourceAsset> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(CompressError::SourceUnreadable(format!("File not found: {}", path.display())));
        }

        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|e| CompressError::MissingDependency(format!("Failed to execute {}: {}", self.ffprobe.display(), e)))?;

        if !output.status.success() {
            return Err(CompressError::SourceUnreadable(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let asset = parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "Probed {}: {:.3}s, video track: {}",
            path.display(),
            asset.duration_seconds,
            asset.video_track.is_some()
        );
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::{self, Orientation};

    const PORTRAIT_PHONE_CLIP: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30000/1001",
                "time_base": "1/600",
                "duration": "12.500000",
                "bit_rate": "8000000",
                "disposition": { "default": 1, "attached_pic": 0 },
                "tags": { "rotate": "90" },
                "side_data_list": [
                    { "side_data_type": "Display Matrix", "displaymatrix": "...", "rotation": -90 }
                ]
            },
            { "index": 1, "codec_type": "audio", "codec_name": "aac" }
        ],
        "format": {
            "duration": "12.533333",
            "size": "13000000",
            "tags": { "title": "Beach", "artist": "Edo" }
        }
    }"#;

    #[test]
    fn test_portrait_clip() {
        let asset = parse_probe_output(Path::new("/v/beach.mov"), PORTRAIT_PHONE_CLIP).unwrap();
        let track = asset.video_track.as_ref().unwrap();

        assert_eq!(asset.duration_seconds, 12.533333);
        assert_eq!(asset.timescale, 600);
        assert_eq!((track.natural_width, track.natural_height), (1920.0, 1080.0));
        assert_eq!(track.preferred_transform, AffineTransform::from_clockwise_degrees(90));
        assert_eq!(orientation::resolve(Some(&track.preferred_transform)).0, Orientation::Portrait);
        assert_eq!(track.source_frame_rate(), 30.0);
        assert!((track.nominal_frame_rate - 29.97).abs() < 0.01);
        assert_eq!(track.total_sample_data_length, 12_500_000);
        assert_eq!(asset.metadata.title.as_deref(), Some("Beach"));
        assert_eq!(asset.metadata.author.as_deref(), Some("Edo"));
    }

    #[test]
    fn test_rotate_tag_without_display_matrix() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "width": 640, "height": 360, "tags": { "ROTATE": "180" } }],
            "format": { "duration": "3.0", "size": "1000" }
        }"#;
        let asset = parse_probe_output(Path::new("/v/a.mp4"), json).unwrap();
        let track = asset.video_track.unwrap();

        assert_eq!(track.preferred_transform.rotation_degrees(), 180);
        assert_eq!(track.total_sample_data_length, 1000);
        assert_eq!(track.frame_duration, None);
        assert_eq!(asset.timescale, DEFAULT_TIMESCALE);
    }

    #[test]
    fn test_audio_only_and_cover_art() {
        let json = r#"{
            "streams": [
                { "codec_type": "audio" },
                { "codec_type": "video", "width": 600, "height": 600, "disposition": { "attached_pic": 1 } }
            ],
            "format": { "duration": "200.0" }
        }"#;
        let asset = parse_probe_output(Path::new("/m/song.m4a"), json).unwrap();
        assert!(asset.video_track.is_none());
        assert_eq!(asset.duration_seconds, 200.0);
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let err = parse_probe_output(Path::new("/v/x.mov"), "not json").unwrap_err();
        assert_eq!(err.code(), "source_unreadable");
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("24000/1001"), Some((24000, 1001)));
    }

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let probe = FfprobeProbe::new("ffprobe");
        let err = probe.probe(Path::new("/definitely/not/here.mov")).await.unwrap_err();
        assert!(matches!(err, CompressError::SourceUnreadable(_)));
    }
}
