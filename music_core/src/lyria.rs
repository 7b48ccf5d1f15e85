//! Live music backend over the Lyria RealTime websocket protocol.
//!
//! Control messages are written from the session; a reader task decodes server
//! frames into [`SessionEvent`]s and forwards them over a channel, so the
//! controller's deadline can drop a pending receive without tearing a frame.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::LyriaConfig;
use crate::error::MusicError;
use crate::session::{GenerationConfig, MusicBackend, MusicSession, SessionEvent, WeightedPrompt};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const SETUP_TIMEOUT: Duration = Duration::from_secs(15);
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    filtered_prompt: Option<FilteredPrompt>,
    warning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    audio_chunks: Vec<AudioChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioChunk {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilteredPrompt {
    text: Option<String>,
    filtered_reason: Option<String>,
}

pub struct LyriaBackend {
    config: LyriaConfig,
}

impl LyriaBackend {
    pub fn new(config: LyriaConfig) -> Self {
        Self { config }
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.config.endpoint, self.config.api_key)
    }
}

/// `wss://` needs a process-wide rustls provider; install ring unless one is set.
fn ensure_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Lost race with another installer is fine
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

#[async_trait]
impl MusicBackend for LyriaBackend {
    async fn connect(&self) -> Result<Box<dyn MusicSession>, MusicError> {
        info!("Connecting to live music model {}", self.config.model);
        ensure_crypto_provider();

        let (ws, _response) = timeout(CONNECT_TIMEOUT, connect_async(self.url()))
            .await
            .map_err(|_| MusicError::negotiation("connection timed out"))?
            .map_err(MusicError::negotiation)?;
        let (mut sink, mut stream) = ws.split();

        send_json(&mut sink, json!({ "setup": { "model": self.config.model } })).await?;
        timeout(SETUP_TIMEOUT, wait_for_setup(&mut stream))
            .await
            .map_err(|_| MusicError::negotiation("setup was not acknowledged"))??;
        debug!("Live session setup complete");

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_events(stream, tx));

        Ok(Box::new(LyriaSession {
            sink,
            events: rx,
            reader,
        }))
    }
}

pub struct LyriaSession {
    sink: SplitSink<WsStream, Message>,
    events: mpsc::Receiver<SessionEvent>,
    reader: JoinHandle<()>,
}

#[async_trait]
impl MusicSession for LyriaSession {
    async fn set_weighted_prompts(&mut self, prompts: &[WeightedPrompt]) -> Result<(), MusicError> {
        send_json(
            &mut self.sink,
            json!({ "clientContent": { "weightedPrompts": prompts } }),
        )
        .await
    }

    async fn set_generation_config(&mut self, config: &GenerationConfig) -> Result<(), MusicError> {
        send_json(&mut self.sink, json!({ "musicGenerationConfig": config })).await
    }

    async fn play(&mut self) -> Result<(), MusicError> {
        send_json(&mut self.sink, json!({ "playbackControl": "PLAY" })).await
    }

    async fn next_event(&mut self) -> SessionEvent {
        self.events.recv().await.unwrap_or(SessionEvent::Closed)
    }

    async fn stop(&mut self) -> Result<(), MusicError> {
        let result = send_json(&mut self.sink, json!({ "playbackControl": "STOP" })).await;
        let _ = self.sink.close().await;
        self.reader.abort();
        result
    }
}

impl Drop for LyriaSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn send_json(
    sink: &mut SplitSink<WsStream, Message>,
    value: serde_json::Value,
) -> Result<(), MusicError> {
    sink.send(Message::Text(value.to_string()))
        .await
        .map_err(MusicError::negotiation)
}

async fn wait_for_setup(stream: &mut SplitStream<WsStream>) -> Result<(), MusicError> {
    while let Some(message) = stream.next().await {
        let message = message.map_err(MusicError::negotiation)?;
        let Some(payload) = frame_payload(message) else {
            continue;
        };
        match serde_json::from_slice::<ServerMessage>(&payload) {
            Ok(msg) if msg.setup_complete.is_some() => return Ok(()),
            Ok(_) => continue,
            Err(e) => warn!("Ignoring unparsable setup frame: {e}"),
        }
    }
    Err(MusicError::negotiation("connection closed during setup"))
}

async fn read_events(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<SessionEvent>) {
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(Message::Close(frame)) => {
                debug!("Live session closed by server: {:?}", frame);
                break;
            }
            Ok(message) => message,
            Err(e) => {
                warn!("Live session read failed: {e}");
                break;
            }
        };
        let Some(payload) = frame_payload(message) else {
            continue;
        };
        if let Some(event) = decode_event(&payload) {
            if tx.send(event).await.is_err() {
                // Receiver dropped, the controller is done
                return;
            }
        }
    }
    let _ = tx.send(SessionEvent::Closed).await;
}

fn frame_payload(message: Message) -> Option<Vec<u8>> {
    match message {
        Message::Text(text) => Some(text.into_bytes()),
        Message::Binary(data) => Some(data),
        _ => None,
    }
}

/// Decode one server frame. Frames without audio or moderation are dropped.
fn decode_event(payload: &[u8]) -> Option<SessionEvent> {
    let message: ServerMessage = match serde_json::from_slice(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Ignoring unparsable server frame: {e}");
            return None;
        }
    };

    if let Some(filtered) = message.filtered_prompt {
        let reason = filtered
            .filtered_reason
            .or(filtered.text)
            .unwrap_or_else(|| "prompt was filtered".to_string());
        return Some(SessionEvent::Filtered { reason });
    }

    if let Some(warning) = message.warning {
        warn!("Live session warning: {warning}");
    }

    let chunks = message.server_content?.audio_chunks;
    let frames: Vec<Vec<u8>> = chunks
        .into_iter()
        .filter_map(|chunk| match general_purpose::STANDARD.decode(chunk.data) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Dropping undecodable audio chunk: {e}");
                None
            }
        })
        .collect();

    if frames.is_empty() {
        None
    } else {
        Some(SessionEvent::Audio(frames))
    }
}
