//! # Video Compress Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare del bridge di compressione video
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri host
//!
//! ## Architettura dei moduli:
//! - `orientation`: Orientamento e posizione camera dalla matrice di trasformazione
//! - `planner`: Dimensioni target, frame rate clampato e stima del bitrate
//! - `composition`: Sorgente passthrough o traccia video singola con time range
//! - `export`: Controller single-flight dell'export, cancellabile
//! - `compressor`: Orchestrazione di una richiesta `compressVideo`
//! - `bridge` / `channel`: Superficie dei metodi e trasporto JSON line-delimited
//! - `thumbnail` / `media_info` / `cache`: Collaboratori di I/O
//! - `ffmpeg` / `platform`: Backend concreto basato su ffmpeg/ffprobe
//! - `config` / `error` / `progress`: Configurazione, errori e progress bar
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use video_compress::{Config, FfmpegBackend, MethodCall};
//!
//! let config = Config::default();
//! let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
//! let bridge = FfmpegBackend::from_config(&config)?.into_bridge(&config, events_tx);
//! let response = bridge.handle(MethodCall::new("getMediaInfo", json!({ "path": "/v/clip.mov" }))).await;
//! ```

pub mod bridge;
pub mod cache;
pub mod channel;
pub mod composition;
pub mod compressor;
pub mod config;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod media_info;
pub mod orientation;
pub mod planner;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{BridgeEvent, Method, MethodCall, MethodResponse, VideoCompressBridge};
pub use compressor::VideoCompressor;
pub use config::Config;
pub use error::CompressError;
pub use export::{ExportController, ExportState};
pub use ffmpeg::{FfmpegBackend, FfmpegBridge};
pub use media_info::{CompressionOutcome, MediaInfo};
pub use planner::{CompressionRequest, ParameterPlanner, Quality, TranscodePlan};
