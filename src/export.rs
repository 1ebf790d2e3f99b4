//! # Export Controller Module
//!
//! Macchina a stati single-flight attorno all'engine di export.
//!
//! ## Responsabilità:
//! - Definisce il trait `ExportEngine` (avvio export, eventi su canale) e `ExportHandle` (stop)
//! - Garantisce al massimo un export `Running` per istanza di controller
//! - Gestisce la richiesta di cancellazione e sopprime il progress successivo
//! - Classifica l'esito finale: `Completed`, `Cancelled` o `Failed`
//!
//! ## Stati:
//! ```text
//! Idle -> Running -> { Completed | Cancelled | Failed }
//! ```
//! Lo slot viene liberato ad ogni stato terminale, per cui il controller torna `Idle`.
//!
//! ## Serializzazione:
//! Slot e flag di cancellazione stanno sotto lo stesso mutex. Tra `cancel()` e
//! `finish()` vince chi prende il lock per secondo: se la cancellazione è già
//! registrata quando arriva il completamento, l'export è `Cancelled`.

use crate::composition::Composition;
use crate::error::{CompressError, Result};
use crate::planner::TranscodePlan;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Final report of the export engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    Completed,
    /// The engine stopped because it was asked to
    Cancelled,
    /// Finished without an explicit success or error
    Incomplete(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Fraction of the export done, in `[0, 1]`
    Progress(f32),
    Finished(EngineOutcome),
}

pub type EngineEvents = mpsc::UnboundedSender<EngineEvent>;

/// One export handed to the engine
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub composition: Composition,
    pub output_path: PathBuf,
    pub plan: TranscodePlan,
    pub source_duration: f64,
}

impl ExportJob {
    /// Seconds of media the engine is expected to write
    pub fn expected_duration(&self) -> f64 {
        self.composition
            .export_time_range()
            .map(|range| range.duration)
            .unwrap_or(self.source_duration)
    }
}

/// Lets the controller stop a running export
pub trait ExportHandle: Send + Sync {
    fn cancel(&self);
}

/// Runs exports in the background and reports through `events`.
///
/// Implementations must send at most one [`EngineEvent::Finished`]; dropping
/// the sender without one is treated as an incomplete export.
pub trait ExportEngine: Send + Sync + 'static {
    fn start(&self, job: ExportJob, events: EngineEvents) -> Result<Arc<dyn ExportHandle>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Identifies the session a transition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket(u64);

/// How a running export ended
#[derive(Debug)]
pub enum Resolution {
    Completed,
    Cancelled,
    Failed(CompressError),
}

struct ActiveSession {
    ticket: SessionTicket,
    handle: Option<Arc<dyn ExportHandle>>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveSession>,
    cancel_requested: bool,
    last_terminal: Option<ExportState>,
    next_id: u64,
}

impl Slot {
    fn is_current(&self, ticket: SessionTicket) -> bool {
        self.active.as_ref().map(|a| a.ticket) == Some(ticket)
    }

    fn close(&mut self, terminal: ExportState) {
        self.active = None;
        self.cancel_requested = false;
        self.last_terminal = Some(terminal);
    }
}

/// Single-flight export state machine
#[derive(Default)]
pub struct ExportController {
    slot: Mutex<Slot>,
}

impl ExportController {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> ExportState {
        if self.slot.lock().await.active.is_some() {
            ExportState::Running
        } else {
            ExportState::Idle
        }
    }

    /// Terminal state reached by the most recent session
    pub async fn last_terminal_state(&self) -> Option<ExportState> {
        self.slot.lock().await.last_terminal
    }

    pub async fn is_cancel_requested(&self) -> bool {
        self.slot.lock().await.cancel_requested
    }

    /// Claim the slot; rejects while another export is running
    pub async fn begin(&self) -> Result<SessionTicket> {
        let mut slot = self.slot.lock().await;
        if slot.active.is_some() {
            warn!("Rejecting compression request, an export is already running");
            return Err(CompressError::Busy);
        }

        slot.next_id += 1;
        let ticket = SessionTicket(slot.next_id);
        slot.active = Some(ActiveSession { ticket, handle: None });
        slot.cancel_requested = false;
        debug!("Export session {} started", ticket.0);
        Ok(ticket)
    }

    /// Record the engine handle; cancels it at once if a cancel already came in
    pub async fn attach(&self, ticket: SessionTicket, handle: Arc<dyn ExportHandle>) {
        let mut slot = self.slot.lock().await;
        let cancel_requested = slot.cancel_requested;
        match slot.active.as_mut() {
            Some(active) if active.ticket == ticket => {
                if cancel_requested {
                    handle.cancel();
                }
                active.handle = Some(handle);
            }
            _ => handle.cancel(),
        }
    }

    /// Progress in percent, or `None` when it must not reach the caller
    pub async fn progress(&self, ticket: SessionTicket, fraction: f32) -> Option<f64> {
        let slot = self.slot.lock().await;
        if !slot.is_current(ticket) || slot.cancel_requested {
            return None;
        }
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        Some(fraction as f64 * 100.0)
    }

    /// Ask the running export to stop. Returns whether one was running.
    pub async fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.active.is_none() {
            debug!("Cancel requested with no export running");
            return false;
        }
        if slot.cancel_requested {
            return true;
        }

        slot.cancel_requested = true;
        if let Some(handle) = slot.active.as_ref().and_then(|a| a.handle.as_ref()) {
            handle.cancel();
        }
        info!("Cancellation requested for the running export");
        true
    }

    /// Classify the engine result. `None` when the ticket is not the running session.
    pub async fn finish(&self, ticket: SessionTicket, outcome: EngineOutcome) -> Option<Resolution> {
        let mut slot = self.slot.lock().await;
        if !slot.is_current(ticket) {
            debug!("Ignoring engine result for stale session {}", ticket.0);
            return None;
        }

        let (terminal, resolution) = if slot.cancel_requested {
            if !matches!(outcome, EngineOutcome::Completed | EngineOutcome::Cancelled) {
                debug!("Engine ended with {:?} after cancellation", outcome);
            }
            (ExportState::Cancelled, Resolution::Cancelled)
        } else {
            match outcome {
                EngineOutcome::Completed => (ExportState::Completed, Resolution::Completed),
                EngineOutcome::Cancelled => (
                    ExportState::Failed,
                    Resolution::Failed(CompressError::IncompleteExport(
                        "export was cancelled by the engine".to_string(),
                    )),
                ),
                EngineOutcome::Incomplete(status) => (
                    ExportState::Failed,
                    Resolution::Failed(CompressError::IncompleteExport(status)),
                ),
                EngineOutcome::Failed(message) => (
                    ExportState::Failed,
                    Resolution::Failed(CompressError::EngineFailure(message)),
                ),
            }
        };

        slot.close(terminal);
        debug!("Export session {} ended as {:?}", ticket.0, terminal);
        Some(resolution)
    }

    /// Close a session that failed before or while launching the engine
    pub async fn abort(&self, ticket: SessionTicket) -> bool {
        let mut slot = self.slot.lock().await;
        if !slot.is_current(ticket) {
            return false;
        }
        slot.close(ExportState::Failed);
        debug!("Export session {} aborted", ticket.0);
        true
    }
}
