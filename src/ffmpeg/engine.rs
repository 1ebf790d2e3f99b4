//! `ExportEngine` running one `ffmpeg` child process per export.
//!
//! Il progress arriva da `-progress pipe:1` su stdout; stderr viene tenuto
//! (ultime righe) per il messaggio di errore. La cancellazione uccide il processo.

use crate::args;
use crate::composition::Composition;
use crate::error::{CompressError, Result};
use crate::export::{EngineEvent, EngineEvents, EngineOutcome, ExportEngine, ExportHandle, ExportJob};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Lines of stderr kept for the failure message
const STDERR_TAIL_LINES: usize = 8;

/// libx264 with yuv420p needs even dimensions
fn even(dimension: u32) -> u32 {
    (dimension - dimension % 2).max(2)
}

/// Command line for `job`, output file last
pub fn build_export_args(job: &ExportJob) -> Vec<String> {
    let plan = &job.plan;
    let mut args = args!["-hide_banner", "-nostdin", "-y", "-loglevel", "error"];

    let range = job.composition.export_time_range();
    if let Some(range) = range {
        args.extend(args!["-ss", format!("{:.3}", range.start)]);
    }
    args.extend(args!["-i", job.composition.source().to_string_lossy()]);
    if let Some(range) = range {
        args.extend(args!["-t", format!("{:.3}", range.duration)]);
    }

    args.extend(args!["-map", "0:v:0"]);
    match &job.composition {
        Composition::Passthrough { .. } => args.extend(args!["-map", "0:a?"]),
        Composition::VideoOnly { .. } => {}
    }

    let scale = format!(
        "scale={}:{},format=yuv420p",
        even(plan.video.width),
        even(plan.video.height)
    );
    args.extend(args![
        "-c:v",
        "libx264",
        "-profile:v",
        plan.video.profile,
        "-preset",
        plan.video.preset,
        "-b:v",
        plan.video.average_bit_rate,
        "-vf",
        scale,
    ]);

    if job.composition.includes_audio() {
        args.extend(args![
            "-c:a",
            "aac",
            "-b:a",
            plan.audio.bit_rate,
            "-ac",
            plan.audio.channels,
            "-ar",
            plan.audio.sample_rate,
        ]);
    } else {
        args.push("-an".to_string());
    }

    if plan.optimize_for_network_use {
        args.extend(args!["-movflags", "+faststart"]);
    }

    args.extend(args!["-progress", "pipe:1", "-nostats", "-f", "mp4"]);
    args.push(job.output_path.to_string_lossy().into_owned());
    args
}

/// Fraction done for one `key=value` line of `-progress` output
pub fn parse_progress_line(line: &str, expected_duration: f64) -> Option<f32> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "progress" if value == "end" => Some(1.0),
        // out_time_ms is in microseconds as well
        "out_time_us" | "out_time_ms" => {
            if expected_duration <= 0.0 {
                return None;
            }
            let micros = value.parse::<i64>().ok()?;
            let fraction = micros.max(0) as f64 / 1_000_000.0 / expected_duration;
            Some(fraction.clamp(0.0, 1.0) as f32)
        }
        _ => None,
    }
}

struct FfmpegExportHandle {
    stop: Arc<Notify>,
}

impl ExportHandle for FfmpegExportHandle {
    fn cancel(&self) {
        self.stop.notify_one();
    }
}

pub struct FfmpegEngine {
    ffmpeg: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into() }
    }
}

impl ExportEngine for FfmpegEngine {
    fn start(&self, job: ExportJob, events: EngineEvents) -> Result<Arc<dyn ExportHandle>> {
        let args = build_export_args(&job);
        debug!("{} {}", self.ffmpeg.display(), args.join(" "));

        let child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CompressError::EngineFailure(format!("Failed to execute {}: {}", self.ffmpeg.display(), e)))?;

        info!(
            "🎬 Exporting {} -> {} ({}x{}, {} bps)",
            job.composition.source().display(),
            job.output_path.display(),
            job.plan.target_width,
            job.plan.target_height,
            job.plan.target_bit_rate
        );

        let stop = Arc::new(Notify::new());
        tokio::spawn(supervise(child, job.expected_duration(), events, Arc::clone(&stop)));
        Ok(Arc::new(FfmpegExportHandle { stop }))
    }
}

async fn supervise(mut child: Child, expected_duration: f64, events: EngineEvents, stop: Arc<Notify>) {
    let progress_task = child.stdout.take().map(|stdout| {
        let events = events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(fraction) = parse_progress_line(&line, expected_duration) {
                    let _ = events.send(EngineEvent::Progress(fraction));
                }
            }
        })
    });

    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail).join("\n")
        })
    });

    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = stop.notified() => None,
    };

    let outcome = match exited {
        Some(Ok(status)) if status.success() => EngineOutcome::Completed,
        Some(Ok(status)) => EngineOutcome::Failed(format!("ffmpeg exited with {}", status)),
        Some(Err(e)) => EngineOutcome::Failed(format!("Failed to wait for ffmpeg: {}", e)),
        None => {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop ffmpeg: {}", e);
            }
            EngineOutcome::Cancelled
        }
    };

    if let Some(task) = progress_task {
        let _ = task.await;
    }
    let stderr_tail = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    let outcome = match outcome {
        EngineOutcome::Failed(message) if !stderr_tail.trim().is_empty() => {
            EngineOutcome::Failed(format!("{}: {}", message, stderr_tail.trim()))
        }
        other => other,
    };
    debug!("ffmpeg finished: {:?}", outcome);
    let _ = events.send(EngineEvent::Finished(outcome));
}
