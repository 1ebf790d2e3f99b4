//! # Video Compressor Module
//!
//! Orchestratore di una singola richiesta `compressVideo`.
//!
//! ## Pipeline di compressione:
//! 1. Occupa lo slot single-flight del controller (rifiuta se già occupato)
//! 2. Legge l'asset sorgente con il `MediaProbe`
//! 3. Calcola il `TranscodePlan` e la `Composition`
//! 4. Rimuove l'eventuale output stale in `<cache>/<nome>.mp4`
//! 5. Avvia l'engine e inoltra il progress (soppresso dopo la cancellazione)
//! 6. Esito finale:
//!    - **Cancelled**: media info della sorgente con `isCancel = true`
//!    - **Completed**: media info del file prodotto con `isCancel = false`, poi
//!      cancella la sorgente se richiesto (errore solo loggato)
//!    - **Failed**: errore restituito al chiamante
//!
//! ## Esempio:
//! ```rust,ignore
//! let compressor = VideoCompressor::new(&config, probe, engine);
//! let outcome = compressor.compress(request, |percent| println!("{:.0}%", percent)).await?;
//! ```

use crate::cache::CacheDir;
use crate::composition::Composition;
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::export::{EngineEvent, EngineOutcome, ExportController, ExportEngine, ExportJob, Resolution, SessionTicket};
use crate::media_info::CompressionOutcome;
use crate::planner::{CompressionRequest, ParameterPlanner};
use crate::probe::MediaProbe;
use crate::utils;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drives compressions through one [`ExportController`]
pub struct VideoCompressor<P, E> {
    probe: Arc<P>,
    engine: Arc<E>,
    controller: ExportController,
    planner: ParameterPlanner,
    cache: CacheDir,
    output_extension: String,
}

impl<P: MediaProbe, E: ExportEngine> VideoCompressor<P, E> {
    pub fn new(config: &Config, probe: Arc<P>, engine: Arc<E>) -> Self {
        Self {
            probe,
            engine,
            controller: ExportController::new(),
            planner: ParameterPlanner::new(config),
            cache: CacheDir::new(config.cache_dir.clone()),
            output_extension: config.output_extension.clone(),
        }
    }

    pub fn controller(&self) -> &ExportController {
        &self.controller
    }

    /// Compress one video. `on_progress` receives percentages in `[0, 100]`.
    pub async fn compress<F>(&self, request: CompressionRequest, on_progress: F) -> Result<CompressionOutcome>
    where
        F: Fn(f64) + Send + Sync,
    {
        let ticket = self.controller.begin().await?;
        let result = self.run(ticket, &request, &on_progress).await;
        if result.is_err() {
            self.controller.abort(ticket).await;
        }
        result
    }

    /// Request cancellation of the running compression; acknowledged immediately
    pub async fn cancel(&self) -> bool {
        self.controller.cancel().await
    }

    async fn run<F>(&self, ticket: SessionTicket, request: &CompressionRequest, on_progress: &F) -> Result<CompressionOutcome>
    where
        F: Fn(f64) + Send + Sync,
    {
        let source = utils::path_from_locator(&request.source_path.to_string_lossy());
        info!("Compressing {}", source.display());

        let asset = self.probe.probe(&source).await?;
        let plan = self.planner.plan(request, &asset)?;
        let composition = Composition::build(plan.include_audio, plan.time_range, &asset)?;

        let output_path = self.cache.output_path_for(&source, &self.output_extension)?;
        if output_path == source {
            return Err(CompressError::InvalidArgument(format!(
                "Source {} is already the compression output",
                source.display()
            )));
        }
        self.cache.ensure().await?;
        CacheDir::remove_file_if_exists(&output_path).await.map_err(|e| {
            CompressError::WriteFailed(format!("Failed to remove stale output {}: {}", output_path.display(), e))
        })?;

        let job = ExportJob {
            composition,
            output_path: output_path.clone(),
            plan,
            source_duration: asset.duration_seconds,
        };
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = self.engine.start(job, events_tx)?;
        self.controller.attach(ticket, handle).await;

        let resolution = loop {
            match events.recv().await {
                Some(EngineEvent::Progress(fraction)) => {
                    if let Some(percent) = self.controller.progress(ticket, fraction).await {
                        on_progress(percent);
                    }
                }
                Some(EngineEvent::Finished(outcome)) => {
                    break self.controller.finish(ticket, outcome).await;
                }
                None => {
                    let outcome = EngineOutcome::Incomplete("engine stopped without reporting a result".to_string());
                    break self.controller.finish(ticket, outcome).await;
                }
            }
        };

        match resolution {
            Some(Resolution::Completed) => {
                info!("Export completed: {}", output_path.display());
                let produced = self.probe.probe(&output_path).await?;
                if request.delete_origin {
                    delete_origin(&source).await;
                }
                Ok(CompressionOutcome::completed(&produced))
            }
            Some(Resolution::Cancelled) => {
                info!("Export cancelled: {}", source.display());
                Ok(CompressionOutcome::cancelled(&asset))
            }
            Some(Resolution::Failed(e)) => {
                warn!("Export failed for {}: {}", source.display(), e);
                Err(e)
            }
            None => Err(CompressError::IncompleteExport("export session is no longer active".to_string())),
        }
    }
}

async fn delete_origin(source: &Path) {
    match CacheDir::remove_file_if_exists(source).await {
        Ok(true) => debug!("Deleted origin {}", source.display()),
        Ok(false) => debug!("Origin {} already gone", source.display()),
        Err(e) => warn!("Failed to delete origin {}: {}", source.display(), e),
    }
}
