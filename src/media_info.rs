//! # Media Info Module
//!
//! Payload JSON restituito da `getMediaInfo` e `compressVideo`.
//!
//! ## Campi:
//! - `path`: Path del file (senza prefisso `file://`)
//! - `title` / `author`: Metadata del container, `null` se assenti
//! - `width` / `height`: Dimensioni dopo la trasformazione della traccia (valori assoluti)
//! - `duration`: Durata in millisecondi
//! - `filesize`: Byte di sample della traccia video
//! - `orientation`: Rotazione in gradi (0, 90, 180, 270)
//! - `isCancel`: Solo nel risultato di `compressVideo`
//!
//! Un asset senza traccia video produce un oggetto vuoto.

use crate::probe::SourceAsset;
use crate::utils;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub width: f64,
    pub height: f64,
    /// Milliseconds
    pub duration: f64,
    pub filesize: u64,
    pub orientation: u32,
}

impl MediaInfo {
    pub fn from_asset(asset: &SourceAsset) -> Option<Self> {
        let track = asset.video_track.as_ref()?;
        let (width, height) = track
            .preferred_transform
            .apply_to_size(track.natural_width, track.natural_height);

        Some(Self {
            path: utils::strip_file_scheme(&asset.path.to_string_lossy()).to_string(),
            title: asset.metadata.title.clone(),
            author: asset.metadata.author.clone(),
            width,
            height,
            duration: asset.duration_seconds * 1000.0,
            filesize: track.total_sample_data_length,
            orientation: track.preferred_transform.rotation_degrees(),
        })
    }

    /// JSON object for the host, `{}` when there is no video track
    pub fn to_value(asset: &SourceAsset) -> serde_json::Value {
        match Self::from_asset(asset) {
            Some(info) => serde_json::to_value(info).unwrap_or_else(|_| serde_json::json!({})),
            None => serde_json::json!({}),
        }
    }
}

/// Result of `compressVideo`: media info of the delivered file plus the cancel flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionOutcome {
    #[serde(flatten)]
    pub info: Option<MediaInfo>,
    #[serde(rename = "isCancel")]
    pub is_cancel: bool,
}

impl CompressionOutcome {
    pub fn completed(output: &SourceAsset) -> Self {
        Self {
            info: MediaInfo::from_asset(output),
            is_cancel: false,
        }
    }

    pub fn cancelled(source: &SourceAsset) -> Self {
        Self {
            info: MediaInfo::from_asset(source),
            is_cancel: true,
        }
    }
}
