//! # Bridge Module
//!
//! Superficie dei metodi esposta all'host: nome del metodo + argomenti JSON
//! in ingresso, risposta tipizzata in uscita.
//!
//! ## Responsabilità:
//! - Decodifica degli argomenti di ogni metodo (errore `invalid_argument` se mancanti)
//! - Instradamento verso compressor, thumbnail service e cache
//! - Pubblicazione degli eventi `updateProgress` durante `compressVideo`
//! - Risposta esplicita "not implemented" per metodi sconosciuti
//!
//! ## Metodi:
//! - `getByteThumbnail` / `getFileThumbnail`: JPEG in memoria o su file
//! - `getMediaInfo`: Media info della sorgente
//! - `compressVideo` / `cancelCompression`: Export single-flight
//! - `deleteAllCache`: Svuota la directory di cache
//! - `setLogLevel`: Accettato e ignorato

use crate::cache::CacheDir;
use crate::compressor::VideoCompressor;
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::export::ExportEngine;
use crate::media_info::MediaInfo;
use crate::planner::CompressionRequest;
use crate::probe::MediaProbe;
use crate::thumbnail::{FrameGrabber, ThumbnailService};
use crate::utils;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const CHANNEL_NAME: &str = "video_compress";
pub const PROGRESS_EVENT: &str = "updateProgress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GetByteThumbnail,
    GetFileThumbnail,
    GetMediaInfo,
    CompressVideo,
    CancelCompression,
    DeleteAllCache,
    SetLogLevel,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "getByteThumbnail" => Some(Self::GetByteThumbnail),
            "getFileThumbnail" => Some(Self::GetFileThumbnail),
            "getMediaInfo" => Some(Self::GetMediaInfo),
            "compressVideo" => Some(Self::CompressVideo),
            "cancelCompression" => Some(Self::CancelCompression),
            "deleteAllCache" => Some(Self::DeleteAllCache),
            "setLogLevel" => Some(Self::SetLogLevel),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetByteThumbnail => "getByteThumbnail",
            Self::GetFileThumbnail => "getFileThumbnail",
            Self::GetMediaInfo => "getMediaInfo",
            Self::CompressVideo => "compressVideo",
            Self::CancelCompression => "cancelCompression",
            Self::DeleteAllCache => "deleteAllCache",
            Self::SetLogLevel => "setLogLevel",
        }
    }
}

/// A method invocation coming from the host
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    /// Raw bytes (JPEG thumbnails)
    Bytes(Vec<u8>),
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResponse {
    fn from_error(method: &str, error: &CompressError) -> Self {
        Self::Error {
            code: error.code().to_string(),
            message: error.to_string(),
            details: Some(Value::String(method.to_string())),
        }
    }
}

/// Events pushed to the host outside of any response
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// `updateProgress`, percent in `[0, 100]`
    Progress(f64),
}

#[derive(Deserialize)]
struct ThumbnailArgs {
    path: String,
    quality: f64,
    position: f64,
}

impl ThumbnailArgs {
    fn jpeg_quality(&self) -> u8 {
        if self.quality.is_finite() {
            self.quality.round().clamp(1.0, 100.0) as u8
        } else {
            100
        }
    }
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

fn decode<T: DeserializeOwned>(method: Method, arguments: &Value) -> Result<T> {
    T::deserialize(arguments)
        .map_err(|e| CompressError::InvalidArgument(format!("{}: {}", method.name(), e)))
}

pub struct VideoCompressBridge<P, G, E> {
    compressor: VideoCompressor<P, E>,
    probe: Arc<P>,
    thumbnails: ThumbnailService<G>,
    cache: CacheDir,
    events: mpsc::UnboundedSender<BridgeEvent>,
}

impl<P, G, E> VideoCompressBridge<P, G, E>
where
    P: MediaProbe,
    G: FrameGrabber,
    E: ExportEngine,
{
    pub fn new(
        config: &Config,
        probe: Arc<P>,
        grabber: Arc<G>,
        engine: Arc<E>,
        events: mpsc::UnboundedSender<BridgeEvent>,
    ) -> Self {
        let cache = CacheDir::new(config.cache_dir.clone());
        Self {
            compressor: VideoCompressor::new(config, Arc::clone(&probe), engine),
            probe,
            thumbnails: ThumbnailService::new(grabber, cache.clone()),
            cache,
            events,
        }
    }

    pub fn compressor(&self) -> &VideoCompressor<P, E> {
        &self.compressor
    }

    /// Serve one call. Never fails: errors become [`MethodResponse::Error`].
    pub async fn handle(&self, call: MethodCall) -> MethodResponse {
        let Some(method) = Method::from_name(&call.method) else {
            debug!("Method not implemented: {}", call.method);
            return MethodResponse::NotImplemented;
        };

        match self.dispatch(method, &call.arguments).await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} failed: {}", method.name(), e);
                MethodResponse::from_error(method.name(), &e)
            }
        }
    }

    async fn dispatch(&self, method: Method, arguments: &Value) -> Result<MethodResponse> {
        match method {
            Method::GetByteThumbnail => {
                let args: ThumbnailArgs = decode(method, arguments)?;
                let path = utils::path_from_locator(&args.path);
                match self.thumbnails.bytes(&path, args.jpeg_quality(), args.position).await? {
                    Some(bytes) => Ok(MethodResponse::Bytes(bytes)),
                    None => Ok(MethodResponse::Success(Value::Null)),
                }
            }
            Method::GetFileThumbnail => {
                let args: ThumbnailArgs = decode(method, arguments)?;
                let path = utils::path_from_locator(&args.path);
                let written = self
                    .thumbnails
                    .file(&path, args.jpeg_quality(), args.position)
                    .await?
                    .ok_or_else(|| CompressError::WriteFailed("getFileThumbnail error".to_string()))?;
                Ok(MethodResponse::Success(Value::String(written.to_string_lossy().into_owned())))
            }
            Method::GetMediaInfo => {
                let args: PathArgs = decode(method, arguments)?;
                let asset = self.probe.probe(&utils::path_from_locator(&args.path)).await?;
                Ok(MethodResponse::Success(MediaInfo::to_value(&asset)))
            }
            Method::CompressVideo => {
                let request: CompressionRequest = decode(method, arguments)?;
                let events = self.events.clone();
                let outcome = self
                    .compressor
                    .compress(request, move |percent| {
                        let _ = events.send(BridgeEvent::Progress(percent));
                    })
                    .await?;
                Ok(MethodResponse::Success(serde_json::to_value(outcome)?))
            }
            Method::CancelCompression => {
                self.compressor.cancel().await;
                Ok(MethodResponse::Success(Value::String(String::new())))
            }
            Method::DeleteAllCache => {
                let removed = self.cache.clear().await?;
                debug!("deleteAllCache removed {} entries", removed);
                Ok(MethodResponse::Success(Value::Bool(true)))
            }
            Method::SetLogLevel => Ok(MethodResponse::Success(Value::Bool(true))),
        }
    }
}
