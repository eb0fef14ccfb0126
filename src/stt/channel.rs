//! Live streaming connection to the transcription backend.
//!
//! The channel is a WebSocket carrying binary PCM audio upstream and JSON
//! transcript events downstream. A connected channel is represented by a
//! [`ChannelHandle`]: audio goes in through a cloneable [`ChannelSender`]
//! (silently dropped once the socket is no longer open), transcript events
//! come out of an mpsc receiver, and `finish` performs an idempotent graceful
//! half-close that lets the backend flush in-flight audio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, info, warn};

use super::messages::{ControlMessage, StreamingResponse};
use crate::audio::AudioChunk;
use crate::error::DictationError;

const AUDIO_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 64;

/// Connection-open parameters, serialized into the URL query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Recognition model identifier.
    pub model: String,
    /// Locale tag, e.g. "en-US".
    pub language: String,
    /// Punctuation / formatting normalization on the backend.
    pub smart_format: bool,
    /// Whether partial hypotheses are emitted.
    pub interim_results: bool,
    /// Audio encoding of the chunks we send.
    pub encoding: String,
    /// Sample rate of the chunks we send.
    pub sample_rate: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            language: "en-US".to_string(),
            smart_format: true,
            interim_results: true,
            encoding: "linear16".to_string(),
            sample_rate: 16000,
        }
    }
}

impl ChannelConfig {
    /// Render the config as a connection URL query string.
    pub fn query_string(&self) -> String {
        format!(
            "model={}&language={}&smart_format={}&interim_results={}&encoding={}&sample_rate={}",
            self.model,
            self.language,
            self.smart_format,
            self.interim_results,
            self.encoding,
            self.sample_rate
        )
    }
}

/// A transcript hypothesis from the backend.
///
/// Events may arrive out of order relative to audio submission; only
/// `is_final` decides what is durable, never arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub sequence: u64,
}

/// Events delivered by an open channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Transcript(TranscriptEvent),
    /// The backend closed the stream (terminal).
    Closed,
    /// The channel failed mid-stream (terminal).
    Error(String),
}

/// Cloneable audio-submission side of a channel.
///
/// `send` is fire-and-forget: chunks are dropped silently when the socket is
/// not open or the outbound queue is full. This is deliberate backpressure
/// avoidance for live audio, not an error.
#[derive(Clone)]
pub struct ChannelSender {
    audio_tx: mpsc::Sender<AudioChunk>,
    open: Arc<AtomicBool>,
}

impl ChannelSender {
    pub fn send(&self, chunk: AudioChunk) {
        if !self.open.load(Ordering::SeqCst) {
            return;
        }
        if self.audio_tx.try_send(chunk).is_err() {
            debug!("Channel outbound queue full, dropping audio chunk");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Owning handle for a connected transcription channel.
pub struct ChannelHandle {
    sender: ChannelSender,
    events: Option<mpsc::Receiver<ChannelEvent>>,
    finish_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ChannelHandle {
    /// Assemble a handle from its parts.
    ///
    /// `audio_tx` feeds the socket writer, `events` is the downstream event
    /// queue, `open` reflects socket liveness, and `finish_tx` triggers the
    /// graceful half-close when fired.
    pub fn new(
        audio_tx: mpsc::Sender<AudioChunk>,
        events: mpsc::Receiver<ChannelEvent>,
        open: Arc<AtomicBool>,
        finish_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            sender: ChannelSender { audio_tx, open },
            events: Some(events),
            finish_tx: Mutex::new(Some(finish_tx)),
        }
    }

    pub fn sender(&self) -> ChannelSender {
        self.sender.clone()
    }

    /// Take the event receiver. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.events.take()
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_open()
    }

    /// Graceful half-close: stop accepting audio and tell the writer to flush
    /// what is queued, then signal end-of-stream to the backend. Safe to call
    /// any number of times, including when already closed.
    pub fn finish(&self) {
        self.sender.open.store(false, Ordering::SeqCst);
        let finish = self.finish_tx.lock().expect("finish mutex poisoned").take();
        if let Some(tx) = finish {
            debug!("Finishing transcription channel");
            let _ = tx.send(());
        }
    }

    /// Hard close used when a handle must be discarded (for example a
    /// handshake that completed after the user already stopped the session).
    pub fn close(&self) {
        self.finish();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Opens streaming connections to a transcription backend.
#[async_trait::async_trait]
pub trait TranscriptionConnector: Send + Sync {
    async fn connect(&self, config: &ChannelConfig) -> Result<ChannelHandle, DictationError>;
}

/// Deepgram-style live transcription connector.
///
/// Authenticates with a pre-shared API key and speaks the JSON event protocol
/// described in [`super::messages`].
pub struct DeepgramConnector {
    url: String,
    api_key: String,
}

impl DeepgramConnector {
    pub fn new(url: String, api_key: String) -> Self {
        Self { url, api_key }
    }
}

#[async_trait::async_trait]
impl TranscriptionConnector for DeepgramConnector {
    async fn connect(&self, config: &ChannelConfig) -> Result<ChannelHandle, DictationError> {
        let url = format!("{}?{}", self.url, config.query_string());
        info!("Connecting to transcription backend: {}", self.url);

        let mut request = url
            .into_client_request()
            .map_err(|e| DictationError::Network(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Token {}", self.api_key))
            .map_err(|e| DictationError::Auth(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (socket, _response) = connect_async(request).await.map_err(classify_ws_error)?;

        info!("Transcription channel connected");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (audio_tx, mut audio_rx) = mpsc::channel::<AudioChunk>(AUDIO_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(EVENT_QUEUE_DEPTH);
        let (finish_tx, mut finish_rx) = oneshot::channel::<()>();
        let open = Arc::new(AtomicBool::new(true));

        // Writer: forwards audio chunks until finished, then flushes whatever
        // is still queued and announces end-of-stream.
        let writer_open = Arc::clone(&open);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_chunk = audio_rx.recv() => match maybe_chunk {
                        Some(chunk) => {
                            if ws_sink.send(Message::Binary(chunk.data)).await.is_err() {
                                writer_open.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = &mut finish_rx => {
                        audio_rx.close();
                        while let Some(chunk) = audio_rx.recv().await {
                            if ws_sink.send(Message::Binary(chunk.data)).await.is_err() {
                                break;
                            }
                        }
                        let close_msg = serde_json::to_string(&ControlMessage::close_stream())
                            .expect("control message serializes");
                        let _ = ws_sink.send(Message::Text(close_msg)).await;
                        break;
                    }
                }
            }
            debug!("Channel writer task exited");
        });

        // Reader: turns backend JSON frames into channel events.
        let reader_open = Arc::clone(&open);
        tokio::spawn(async move {
            let mut sequence = 0u64;
            let mut terminal_sent = false;

            while let Some(frame) = ws_stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<StreamingResponse>(&text) {
                        Ok(resp) => {
                            let transcript = resp.transcript();
                            if transcript.is_empty() {
                                continue;
                            }
                            let event = ChannelEvent::Transcript(TranscriptEvent {
                                text: transcript.to_string(),
                                is_final: resp.is_final,
                                sequence,
                            });
                            sequence += 1;
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("Ignoring unparseable backend frame: {}", e);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        reader_open.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(ChannelEvent::Closed).await;
                        terminal_sent = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Transcription channel error: {}", e);
                        reader_open.store(false, Ordering::SeqCst);
                        let _ = event_tx.send(ChannelEvent::Error(e.to_string())).await;
                        terminal_sent = true;
                        break;
                    }
                }
            }

            reader_open.store(false, Ordering::SeqCst);
            if !terminal_sent {
                let _ = event_tx.send(ChannelEvent::Closed).await;
            }
            debug!("Channel reader task exited");
        });

        Ok(ChannelHandle::new(audio_tx, event_rx, open, finish_tx))
    }
}

/// Map a handshake failure onto the auth/network split the session cares
/// about: 4xx rejections are credential problems, everything else transport.
fn classify_ws_error(error: WsError) -> DictationError {
    match error {
        WsError::Http(response) if response.status().is_client_error() => {
            DictationError::Auth(format!("handshake rejected: {}", response.status()))
        }
        other => DictationError::Network(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_carries_all_connection_options() {
        let config = ChannelConfig::default();
        let qs = config.query_string();
        assert!(qs.contains("model=nova-2"));
        assert!(qs.contains("language=en-US"));
        assert!(qs.contains("smart_format=true"));
        assert!(qs.contains("interim_results=true"));
        assert!(qs.contains("encoding=linear16"));
        assert!(qs.contains("sample_rate=16000"));
    }

    #[tokio::test]
    async fn send_after_finish_is_silently_dropped() {
        let (audio_tx, mut audio_rx) = mpsc::channel(4);
        let (_event_tx, event_rx) = mpsc::channel(4);
        let (finish_tx, _finish_rx) = oneshot::channel();
        let open = Arc::new(AtomicBool::new(true));

        let handle = ChannelHandle::new(audio_tx, event_rx, open, finish_tx);
        let sender = handle.sender();

        sender.send(AudioChunk {
            data: vec![1, 2],
            sequence: 0,
        });
        assert!(audio_rx.try_recv().is_ok());

        handle.finish();
        sender.send(AudioChunk {
            data: vec![3, 4],
            sequence: 1,
        });
        assert!(audio_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn finish_is_idempotent() {
        let (audio_tx, _audio_rx) = mpsc::channel(4);
        let (_event_tx, event_rx) = mpsc::channel(4);
        let (finish_tx, mut finish_rx) = oneshot::channel();
        let open = Arc::new(AtomicBool::new(true));

        let handle = ChannelHandle::new(audio_tx, event_rx, open, finish_tx);
        handle.finish();
        handle.finish();
        handle.close();

        assert!(finish_rx.try_recv().is_ok());
        assert!(!handle.is_open());
    }
}
