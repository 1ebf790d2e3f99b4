//! In-crate fakes for the probe, export engine and frame grabber.

use crate::error::{CompressError, Result};
use crate::export::{EngineEvent, EngineEvents, EngineOutcome, ExportEngine, ExportHandle, ExportJob};
use crate::orientation::AffineTransform;
use crate::probe::{AssetMetadata, FrameDuration, MediaProbe, SourceAsset, TrackGeometry};
use crate::thumbnail::FrameGrabber;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A 10 second, 30 fps asset with a single video track
pub fn asset(path: &str, width: f64, height: f64, transform: AffineTransform) -> SourceAsset {
    asset_at(PathBuf::from(path), width, height, transform)
}

pub fn asset_at(path: PathBuf, width: f64, height: f64, transform: AffineTransform) -> SourceAsset {
    SourceAsset {
        path,
        duration_seconds: 10.0,
        timescale: 600,
        video_track: Some(TrackGeometry {
            natural_width: width,
            natural_height: height,
            preferred_transform: transform,
            nominal_frame_rate: 30.0,
            frame_duration: Some(FrameDuration { value: 1, timescale: 30 }),
            total_sample_data_length: 1_000_000,
        }),
        metadata: AssetMetadata {
            title: Some("clip".to_string()),
            author: None,
        },
    }
}

#[derive(Default)]
pub struct FakeProbe {
    assets: Mutex<HashMap<PathBuf, SourceAsset>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, asset: SourceAsset) -> Self {
        self.insert(asset);
        self
    }

    pub fn insert(&self, asset: SourceAsset) {
        self.assets.lock().unwrap().insert(asset.path.clone(), asset);
    }
}

impl MediaProbe for FakeProbe {
    async fn probe(&self, path: &Path) -> Result<SourceAsset> {
        let found = self.assets.lock().unwrap().get(path).cloned();
        found.ok_or_else(|| CompressError::SourceUnreadable(format!("File not found: {}", path.display())))
    }
}

/// An export the test drives by hand
pub struct StartedExport {
    pub job: ExportJob,
    pub events: EngineEvents,
}

enum Script {
    Manual(mpsc::UnboundedSender<StartedExport>),
    Complete { progress: Vec<f32> },
    Outcome(EngineOutcome),
    CloseSilently,
}

pub struct FakeEngine {
    script: Script,
    pub jobs: Mutex<Vec<ExportJob>>,
    pub cancels: Arc<AtomicUsize>,
}

impl FakeEngine {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            jobs: Mutex::new(Vec::new()),
            cancels: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hands every started export to the returned receiver
    pub fn manual() -> (Self, mpsc::UnboundedReceiver<StartedExport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_script(Script::Manual(tx)), rx)
    }

    /// Writes the output file, reports `progress` then completes
    pub fn completing(progress: Vec<f32>) -> Self {
        Self::with_script(Script::Complete { progress })
    }

    pub fn finishing_with(outcome: EngineOutcome) -> Self {
        Self::with_script(Script::Outcome(outcome))
    }

    /// Drops the event channel without a final event
    pub fn closing_silently() -> Self {
        Self::with_script(Script::CloseSilently)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl ExportEngine for FakeEngine {
    fn start(&self, job: ExportJob, events: EngineEvents) -> Result<Arc<dyn ExportHandle>> {
        self.jobs.lock().unwrap().push(job.clone());

        match &self.script {
            Script::Manual(started) => {
                let _ = started.send(StartedExport { job, events });
            }
            Script::Complete { progress } => {
                std::fs::write(&job.output_path, b"compressed")?;
                for fraction in progress {
                    let _ = events.send(EngineEvent::Progress(*fraction));
                }
                let _ = events.send(EngineEvent::Finished(EngineOutcome::Completed));
            }
            Script::Outcome(outcome) => {
                let _ = events.send(EngineEvent::Finished(outcome.clone()));
            }
            Script::CloseSilently => drop(events),
        }

        Ok(Arc::new(CountingHandle { cancels: Arc::clone(&self.cancels) }))
    }
}

pub struct CountingHandle {
    pub cancels: Arc<AtomicUsize>,
}

impl CountingHandle {
    pub fn new() -> (Arc<Self>, Arc<AtomicUsize>) {
        let cancels = Arc::new(AtomicUsize::new(0));
        (Arc::new(Self { cancels: Arc::clone(&cancels) }), cancels)
    }
}

impl ExportHandle for CountingHandle {
    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeGrabber {
    frame: Option<DynamicImage>,
}

impl FakeGrabber {
    pub fn solid() -> Self {
        Self {
            frame: Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 9, Rgb([200, 40, 40])))),
        }
    }

    pub fn empty() -> Self {
        Self { frame: None }
    }
}

impl FrameGrabber for FakeGrabber {
    async fn grab_frame(&self, _path: &Path, _position_seconds: f64) -> Result<Option<DynamicImage>> {
        Ok(self.frame.clone())
    }
}
