//! # FFmpeg Backend Module
//!
//! Implementazioni concrete dei collaboratori esterni basate su `ffmpeg` / `ffprobe`.
//!
//! ## Responsabilità:
//! - `FfprobeProbe`: Lettura di geometria, rotazione, frame rate e metadata (JSON di ffprobe)
//! - `FfmpegEngine`: Export H.264/AAC con progress da `-progress pipe:1` e cancellazione
//! - `FfmpegFrameGrabber`: Estrazione di un frame PNG per i thumbnail
//! - Risoluzione dei binari tramite `ToolPathResolver`
//!
//! ## Dipendenze richieste:
//! - `ffmpeg`: Export e thumbnail
//! - `ffprobe`: Analisi proprietà video

pub mod engine;
pub mod frames;
pub mod probe;

pub use engine::FfmpegEngine;
pub use frames::FfmpegFrameGrabber;
pub use probe::FfprobeProbe;

use crate::bridge::{BridgeEvent, VideoCompressBridge};
use crate::config::Config;
use crate::error::Result;
use crate::platform::ToolPathResolver;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Bridge wired to the ffmpeg backend
pub type FfmpegBridge = VideoCompressBridge<FfprobeProbe, FfmpegFrameGrabber, FfmpegEngine>;

pub struct FfmpegBackend {
    pub probe: Arc<FfprobeProbe>,
    pub frames: Arc<FfmpegFrameGrabber>,
    pub engine: Arc<FfmpegEngine>,
}

impl FfmpegBackend {
    /// Resolve `ffmpeg` and `ffprobe`; fails with `MissingDependency` when either is absent
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_resolver(&ToolPathResolver::new(config))
    }

    pub fn with_resolver(resolver: &ToolPathResolver) -> Result<Self> {
        resolver.verify_tools()?;
        let ffmpeg = resolver.check_tool_with_instructions("ffmpeg")?;
        let ffprobe = resolver.check_tool_with_instructions("ffprobe")?;
        debug!("Using ffmpeg {} and ffprobe {}", ffmpeg.display(), ffprobe.display());

        Ok(Self {
            probe: Arc::new(FfprobeProbe::new(ffprobe)),
            frames: Arc::new(FfmpegFrameGrabber::new(ffmpeg.clone())),
            engine: Arc::new(FfmpegEngine::new(ffmpeg)),
        })
    }

    pub fn into_bridge(self, config: &Config, events: mpsc::UnboundedSender<BridgeEvent>) -> FfmpegBridge {
        VideoCompressBridge::new(config, self.probe, self.frames, self.engine, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backend_requires_both_tools() {
        let temp_dir = TempDir::new().unwrap();
        let search_path = std::env::join_paths([temp_dir.path()]).unwrap();
        let ffmpeg = temp_dir.path().join(ToolPathResolver::executable_name("ffmpeg"));
        std::fs::write(&ffmpeg, b"").unwrap();

        let config = Config::default();
        let resolver = ToolPathResolver::from_parts(&config, None, Some(search_path.clone()));
        let err = FfmpegBackend::with_resolver(&resolver).err().unwrap();
        assert_eq!(err.code(), "missing_dependency");

        std::fs::write(temp_dir.path().join(ToolPathResolver::executable_name("ffprobe")), b"").unwrap();
        let resolver = ToolPathResolver::from_parts(&config, None, Some(search_path));
        assert!(FfmpegBackend::with_resolver(&resolver).is_ok());
    }
}
