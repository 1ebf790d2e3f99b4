//! # Video Compress - Main Entry Point
//!
//! Questo è il punto di ingresso della CLI `video-compress`.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (su stderr, stdout resta al canale)
//! - Caricamento della configurazione (file JSON opzionale + override da CLI)
//! - Esecuzione dei metodi del bridge sul backend ffmpeg
//!
//! ## Comandi:
//! - `info`: Media info di un video
//! - `thumbnail`: Scrive un thumbnail JPEG nella cache
//! - `compress`: Compressione con progress bar, Ctrl-C cancella
//! - `clear-cache`: Svuota la directory di cache
//! - `serve`: Canale JSON line-delimited su stdin/stdout
//! - `tools`: Report di disponibilità di ffmpeg/ffprobe
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-compress compress /path/to/clip.mov --quality 3 --max-size-minor 720 --verbose
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use video_compress::cache::CacheDir;
use video_compress::channel;
use video_compress::platform::ToolPathResolver;
use video_compress::progress::ProgressManager;
use video_compress::{BridgeEvent, Config, FfmpegBackend, Method, MethodCall, MethodResponse};

#[derive(Parser)]
#[command(name = "video-compress")]
#[command(about = "Compress videos, grab thumbnails and read media info")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory receiving compressed videos and thumbnails
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the media info of a video as JSON
    Info { path: String },

    /// Write a JPEG thumbnail into the cache directory
    Thumbnail {
        path: String,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value = "100")]
        quality: u8,

        /// Position of the frame in seconds
        #[arg(short, long, default_value = "0")]
        position: f64,
    },

    /// Compress a video into the cache directory
    Compress {
        path: String,

        /// Encoder quality (1 = fast, 2 = medium, 3 = best)
        #[arg(short, long, default_value = "2")]
        quality: i64,

        /// Delete the source once the export completed
        #[arg(long)]
        delete_origin: bool,

        /// Start of the exported range in seconds (video-only exports)
        #[arg(long)]
        start_time: Option<f64>,

        /// Duration of the exported range in seconds (video-only exports)
        #[arg(long)]
        duration: Option<f64>,

        /// Drop the audio track
        #[arg(long)]
        no_audio: bool,

        /// Cap for the shorter side of the output
        #[arg(long)]
        max_size_minor: Option<u32>,

        /// Bitrate multiplier
        #[arg(long)]
        bit_rate_multiplier: Option<f64>,

        /// Frame rate hint (accepted for compatibility, the source rate is kept)
        #[arg(long)]
        frame_rate: Option<f64>,
    },

    /// Delete everything in the cache directory
    ClearCache,

    /// Serve the bridge over stdin/stdout, one JSON message per line
    Serve,

    /// Report ffmpeg/ffprobe availability
    Tools,
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("video_compress={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn load_config(path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(cache_dir) = cache_dir {
        config.cache_dir = cache_dir;
    }
    config.validate()?;
    debug!("Cache directory: {}", config.cache_dir.display());
    Ok(config)
}

/// Success value of a bridge response, anything else as an error
fn into_value(method: Method, response: MethodResponse) -> Result<Value> {
    match response {
        MethodResponse::Success(value) => Ok(value),
        MethodResponse::Bytes(bytes) => Ok(Value::String(hex::encode(bytes))),
        MethodResponse::Error { code, message, .. } => Err(anyhow::anyhow!("{} failed: {} ({})", method.name(), message, code)),
        MethodResponse::NotImplemented => Err(anyhow::anyhow!("{} is not implemented", method.name())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(cli.config.as_deref(), cli.cache_dir.clone()).await?;

    match cli.command {
        Command::Info { path } => {
            let (events_tx, _events) = mpsc::unbounded_channel();
            let bridge = FfmpegBackend::from_config(&config)?.into_bridge(&config, events_tx);
            let response = bridge.handle(MethodCall::new(Method::GetMediaInfo.name(), json!({ "path": path }))).await;
            println!("{}", serde_json::to_string_pretty(&into_value(Method::GetMediaInfo, response)?)?);
        }
        Command::Thumbnail { path, quality, position } => {
            let (events_tx, _events) = mpsc::unbounded_channel();
            let bridge = FfmpegBackend::from_config(&config)?.into_bridge(&config, events_tx);
            let arguments = json!({ "path": path, "quality": quality, "position": position });
            let response = bridge.handle(MethodCall::new(Method::GetFileThumbnail.name(), arguments)).await;
            match into_value(Method::GetFileThumbnail, response)? {
                Value::String(written) => println!("{}", written),
                other => println!("{}", other),
            }
        }
        Command::Compress {
            path,
            quality,
            delete_origin,
            start_time,
            duration,
            no_audio,
            max_size_minor,
            bit_rate_multiplier,
            frame_rate,
        } => {
            let arguments = json!({
                "path": path,
                "quality": quality,
                "deleteOrigin": delete_origin,
                "startTime": start_time,
                "duration": duration,
                "includeAudio": !no_audio,
                "frameRate": frame_rate,
                "maxSizeMinor": max_size_minor,
                "bitRateMultiplier": bit_rate_multiplier,
            });
            compress(&config, &path, arguments).await?;
        }
        Command::ClearCache => {
            let spinner = ProgressManager::spinner("Clearing cache...");
            let removed = CacheDir::new(config.cache_dir.clone()).clear().await?;
            spinner.finish_with_message(format!("✅ Removed {} entries from {}", removed, config.cache_dir.display()));
        }
        Command::Serve => {
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let bridge = FfmpegBackend::from_config(&config)?.into_bridge(&config, events_tx);
            info!("Serving {} on stdin/stdout", video_compress::bridge::CHANNEL_NAME);
            channel::serve(
                Arc::new(bridge),
                events_rx,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
        }
        Command::Tools => {
            println!("{}", ToolPathResolver::new(&config).get_tools_report());
        }
    }

    Ok(())
}

async fn compress(config: &Config, path: &str, arguments: Value) -> Result<()> {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let bridge = Arc::new(FfmpegBackend::from_config(config)?.into_bridge(config, events_tx));

    let label = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let progress = ProgressManager::new(&label);

    let mut running = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.handle(MethodCall::new(Method::CompressVideo.name(), arguments)).await })
    };

    let mut cancel_sent = false;
    let response = loop {
        tokio::select! {
            joined = &mut running => break joined.context("compression task failed")?,
            Some(BridgeEvent::Progress(percent)) = events.recv() => progress.set_percent(percent),
            _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                cancel_sent = true;
                progress.set_message("cancelling...");
                bridge.handle(MethodCall::new(Method::CancelCompression.name(), Value::Null)).await;
            }
        }
    };

    let outcome = match into_value(Method::CompressVideo, response) {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.abandon("❌ failed");
            return Err(e);
        }
    };

    if outcome["isCancel"] == json!(true) {
        progress.abandon("⏹ cancelled");
    } else {
        progress.finish("✅ done");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
