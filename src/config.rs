//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del bridge.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri di compressione e di cache
//! - Fornisce validazione dei parametri di input
//! - Supporta il caricamento della configurazione da file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `cache_dir`: Directory di output per video compressi e thumbnail
//! - `output_extension`: Estensione del file compresso (default: "mp4")
//! - `default_max_minor`: Lato minore massimo (default: 480)
//! - `default_bit_rate_multiplier`: Moltiplicatore bitrate (default: 2.0)
//! - `audio_bit_rate` / `audio_channels` / `audio_sample_rate`: AAC 128k stereo 44.1 kHz
//! - `optimize_for_network_use`: MP4 con moov in testa (default: true)
//! - `ffmpeg_path` / `ffprobe_path`: Override dei tool (default: risoluzione automatica)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     default_max_minor: 720,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the compression bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving compressed videos and thumbnails
    pub cache_dir: PathBuf,
    /// Extension of the compressed output
    pub output_extension: String,
    /// Cap applied to the shorter side when the request has none
    pub default_max_minor: u32,
    /// Bitrate multiplier when the request has none
    pub default_bit_rate_multiplier: f64,
    /// AAC bitrate in bits per second
    pub audio_bit_rate: u32,
    pub audio_channels: u8,
    pub audio_sample_rate: u32,
    /// Write the MP4 index up front
    pub optimize_for_network_use: bool,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_extension: "mp4".to_string(),
            default_max_minor: 480,
            default_bit_rate_multiplier: 2.0,
            audio_bit_rate: 128_000,
            audio_channels: 2,
            audio_sample_rate: 44_100,
            optimize_for_network_use: true,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("video_compress")
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.output_extension.is_empty() || self.output_extension.contains('.') {
            return Err(anyhow::anyhow!("Output extension must be a bare extension like \"mp4\""));
        }

        if self.default_max_minor < 2 {
            return Err(anyhow::anyhow!("Default minor dimension must be at least 2"));
        }

        if !(self.default_bit_rate_multiplier > 0.0) {
            return Err(anyhow::anyhow!("Bitrate multiplier must be greater than 0"));
        }

        if self.audio_bit_rate == 0 || self.audio_channels == 0 || self.audio_sample_rate == 0 {
            return Err(anyhow::anyhow!("Audio bitrate, channels and sample rate must be greater than 0"));
        }

        if self.cache_dir.exists() && !self.cache_dir.is_dir() {
            return Err(anyhow::anyhow!("Cache path is not a directory: {}", self.cache_dir.display()));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}
