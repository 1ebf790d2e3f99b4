//! # Channel Module
//!
//! Trasporto del bridge su stream: un oggetto JSON per riga in entrambe le direzioni.
//!
//! ## Responsabilità:
//! - Legge le richieste `{"id", "method", "arguments"}` dall'input
//! - Serve ogni richiesta su un task separato (`cancelCompression` risponde
//!   mentre `compressVideo` è ancora in corso)
//! - Serializza risposte ed eventi `updateProgress` sull'output
//! - A fine input attende le richieste pendenti prima di chiudere
//!
//! ## Tipi di messaggi:
//! - `result`: Valore JSON di ritorno
//! - `bytes`: Byte del thumbnail in esadecimale
//! - `error`: Codice, messaggio e dettagli dell'errore
//! - `not_implemented`: Metodo sconosciuto
//! - `event`: Evento asincrono (`updateProgress`)

use crate::bridge::{BridgeEvent, MethodCall, MethodResponse, VideoCompressBridge, PROGRESS_EVENT};
use crate::error::Result;
use crate::export::ExportEngine;
use crate::probe::MediaProbe;
use crate::thumbnail::FrameGrabber;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ChannelRequest {
    pub fn into_call(self) -> (u64, MethodCall) {
        (self.id, MethodCall::new(self.method, self.arguments))
    }
}

/// One line written to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    Result {
        id: u64,
        value: Value,
    },
    Bytes {
        id: u64,
        hex: String,
    },
    Error {
        id: Option<u64>,
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented {
        id: u64,
    },
    Event {
        method: &'static str,
        arguments: f64,
    },
}

impl ChannelMessage {
    pub fn response(id: u64, response: MethodResponse) -> Self {
        match response {
            MethodResponse::Success(value) => Self::Result { id, value },
            MethodResponse::Bytes(bytes) => Self::Bytes { id, hex: hex::encode(bytes) },
            MethodResponse::Error { code, message, details } => Self::Error {
                id: Some(id),
                code,
                message,
                details,
            },
            MethodResponse::NotImplemented => Self::NotImplemented { id },
        }
    }

    pub fn event(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Progress(percent) => Self::Event {
                method: PROGRESS_EVENT,
                arguments: percent,
            },
        }
    }

    fn malformed(error: &serde_json::Error) -> Self {
        Self::Error {
            id: None,
            code: "invalid_argument".to_string(),
            message: format!("Malformed request: {}", error),
            details: None,
        }
    }
}

async fn write_message<W: AsyncWrite + Unpin>(output: &mut W, message: &ChannelMessage) -> Result<()> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

/// Serve `bridge` until `input` reaches EOF and every pending call has answered
pub async fn serve<P, G, E, R, W>(
    bridge: Arc<VideoCompressBridge<P, G, E>>,
    mut events: mpsc::UnboundedReceiver<BridgeEvent>,
    input: R,
    mut output: W,
) -> Result<()>
where
    P: MediaProbe,
    G: FrameGrabber,
    E: ExportEngine,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (responses_tx, mut responses) = mpsc::unbounded_channel::<ChannelMessage>();
    let mut lines = input.lines();
    let mut tasks = JoinSet::new();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match serde_json::from_str::<ChannelRequest>(&line) {
                    Ok(request) => {
                        let (id, call) = request.into_call();
                        debug!("<- {} #{}", call.method, id);
                        let bridge = Arc::clone(&bridge);
                        let responses_tx = responses_tx.clone();
                        tasks.spawn(async move {
                            let response = bridge.handle(call).await;
                            let _ = responses_tx.send(ChannelMessage::response(id, response));
                        });
                    }
                    Err(e) => {
                        warn!("Malformed request: {}", e);
                        write_message(&mut output, &ChannelMessage::malformed(&e)).await?;
                    }
                },
                None => {
                    debug!("Input closed, waiting for {} pending calls", tasks.len());
                    input_open = false;
                }
            },
            Some(event) = events.recv() => {
                write_message(&mut output, &ChannelMessage::event(event)).await?;
            }
            Some(message) = responses.recv() => {
                // events a call sent before answering go out ahead of its answer
                while let Ok(event) = events.try_recv() {
                    write_message(&mut output, &ChannelMessage::event(event)).await?;
                }
                write_message(&mut output, &message).await?;
            }
            Some(joined) = tasks.join_next() => {
                if let Err(e) = joined {
                    warn!("Request task failed: {}", e);
                }
            }
            else => break,
        }

        if !input_open && tasks.is_empty() {
            break;
        }
    }

    while let Ok(event) = events.try_recv() {
        write_message(&mut output, &ChannelMessage::event(event)).await?;
    }
    while let Ok(message) = responses.try_recv() {
        write_message(&mut output, &message).await?;
    }
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::orientation::AffineTransform;
    use crate::testing::{asset_at, FakeEngine, FakeGrabber, FakeProbe};
    use serde_json::json;
    use tempfile::TempDir;

    fn parse_lines(output: &[u8]) -> Vec<Value> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn by_id(messages: &[Value], id: u64) -> &Value {
        messages.iter().find(|m| m["id"] == json!(id)).unwrap()
    }

    #[test]
    fn test_message_shapes() {
        let bytes = serde_json::to_value(ChannelMessage::response(4, MethodResponse::Bytes(vec![0xff, 0xd8]))).unwrap();
        assert_eq!(bytes, json!({ "type": "bytes", "id": 4, "hex": "ffd8" }));

        let event = serde_json::to_value(ChannelMessage::event(BridgeEvent::Progress(42.5))).unwrap();
        assert_eq!(event, json!({ "type": "event", "method": "updateProgress", "arguments": 42.5 }));

        let missing = serde_json::to_value(ChannelMessage::response(9, MethodResponse::NotImplemented)).unwrap();
        assert_eq!(missing, json!({ "type": "not_implemented", "id": 9 }));
    }

    #[tokio::test]
    async fn test_serve_answers_every_request() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("trip.mov");
        std::fs::write(&source, b"original").unwrap();
        let config = Config {
            cache_dir: temp_dir.path().join("cache"),
            ..Default::default()
        };
        let probe = FakeProbe::new()
            .with(asset_at(source.clone(), 1280.0, 720.0, AffineTransform::IDENTITY))
            .with(asset_at(config.cache_dir.join("trip.mp4"), 853.0, 480.0, AffineTransform::IDENTITY));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(VideoCompressBridge::new(
            &config,
            Arc::new(probe),
            Arc::new(FakeGrabber::solid()),
            Arc::new(FakeEngine::completing(vec![0.5])),
            events_tx,
        ));

        let path = source.to_string_lossy();
        let input = [
            json!({ "id": 1, "method": "getMediaInfo", "arguments": { "path": path } }).to_string(),
            json!({ "id": 2, "method": "getVideoDuration" }).to_string(),
            "{not json".to_string(),
            String::new(),
            json!({ "id": 3, "method": "getByteThumbnail", "arguments": { "path": path, "quality": 80, "position": 0 } }).to_string(),
            json!({ "id": 4, "method": "compressVideo", "arguments": { "path": path, "quality": 2, "deleteOrigin": false } }).to_string(),
        ]
        .join("\n");

        let mut output = Vec::new();
        serve(bridge, events_rx, input.as_bytes(), &mut output).await.unwrap();
        let messages = parse_lines(&output);

        assert_eq!(by_id(&messages, 1)["type"], json!("result"));
        assert_eq!(by_id(&messages, 1)["value"]["width"], json!(1280.0));
        assert_eq!(by_id(&messages, 2)["type"], json!("not_implemented"));
        assert!(by_id(&messages, 3)["hex"].as_str().unwrap().starts_with("ffd8"));
        assert_eq!(by_id(&messages, 4)["value"]["isCancel"], json!(false));

        let malformed = messages.iter().find(|m| m["type"] == json!("error")).unwrap();
        assert_eq!(malformed["id"], Value::Null);
        assert_eq!(malformed["code"], json!("invalid_argument"));

        assert!(messages
            .iter()
            .any(|m| m["type"] == json!("event") && m["arguments"] == json!(50.0)));
        assert_eq!(messages.len(), 6);
    }

    #[tokio::test]
    async fn test_progress_events_precede_the_compress_result() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("walk.mov");
        std::fs::write(&source, b"original").unwrap();
        let config = Config {
            cache_dir: temp_dir.path().join("cache"),
            ..Default::default()
        };
        let probe = FakeProbe::new()
            .with(asset_at(source.clone(), 1920.0, 1080.0, AffineTransform::IDENTITY))
            .with(asset_at(config.cache_dir.join("walk.mp4"), 853.0, 480.0, AffineTransform::IDENTITY));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(VideoCompressBridge::new(
            &config,
            Arc::new(probe),
            Arc::new(FakeGrabber::solid()),
            Arc::new(FakeEngine::completing(vec![0.25, 0.5, 0.75])),
            events_tx,
        ));

        let path = source.to_string_lossy();
        let input = json!({ "id": 7, "method": "compressVideo", "arguments": { "path": path } }).to_string();

        let mut output = Vec::new();
        serve(bridge, events_rx, input.as_bytes(), &mut output).await.unwrap();
        let messages = parse_lines(&output);

        let result_at = messages.iter().position(|m| m["id"] == json!(7)).unwrap();
        let event_positions: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m["type"] == json!("event"))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(event_positions.len(), 3);
        assert!(event_positions.iter().all(|&i| i < result_at));
        assert_eq!(result_at, messages.len() - 1);
    }
}
