//! Dictation session manager.
//!
//! Owns the recording state machine, drives microphone and channel
//! acquisition, routes transcript events into the buffer, and hands the
//! buffer off to the text-injection sink on explicit user command.
//!
//! Acquisition opens the capture device and the transcription channel
//! concurrently; recording begins only once both are ready. A stop during
//! acquisition bumps the session generation so that a late-completing
//! handshake is discarded and its resources released instead of reviving a
//! session the user already abandoned.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{SessionState, StateMachine};
use super::stats::SessionStats;
use crate::audio::{AudioCapture, CaptureHandle};
use crate::buffer::TranscriptBuffer;
use crate::error::DictationError;
use crate::inject::TextInjector;
use crate::stt::{ChannelConfig, ChannelEvent, ChannelHandle, TranscriptionConnector};

/// How long to wait for shutdown of the forwarding tasks before aborting.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for session acquisition.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Channel connection parameters.
    pub channel: ChannelConfig,
    /// Upper bound on the combined mic + channel acquisition.
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            connect_timeout: Duration::from_secs(12),
        }
    }
}

/// Resources owned by one recording cycle.
struct ActiveSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    capture: CaptureHandle,
    channel: ChannelHandle,
    audio_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    /// Release every resource without waiting for task shutdown.
    fn release(&mut self) {
        self.capture.close();
        self.channel.close();
        if let Some(task) = self.audio_task.take() {
            task.abort();
        }
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
    }
}

/// Orchestrates capture, streaming transcription, the transcript buffer, and
/// the text-injection hand-off. One logical session per manager.
pub struct DictationSessionManager {
    options: SessionOptions,
    capture: Arc<dyn AudioCapture>,
    connector: Arc<dyn TranscriptionConnector>,
    injector: Arc<StdMutex<Box<dyn TextInjector>>>,

    state: StateMachine,
    /// Bumped on every start and stop; a stale acquisition detects the bump
    /// and discards itself.
    generation: AtomicU64,
    session: Arc<Mutex<Option<ActiveSession>>>,

    buffer: Arc<StdMutex<TranscriptBuffer>>,
    preview_tx: watch::Sender<String>,
    chunks_forwarded: Arc<AtomicUsize>,
    final_segments: Arc<AtomicUsize>,
    last_error: Arc<StdMutex<Option<String>>>,
}

impl DictationSessionManager {
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        connector: Arc<dyn TranscriptionConnector>,
        injector: Box<dyn TextInjector>,
        options: SessionOptions,
    ) -> Self {
        let (preview_tx, _) = watch::channel(String::new());
        Self {
            options,
            capture,
            connector,
            injector: Arc::new(StdMutex::new(injector)),
            state: StateMachine::new(),
            generation: AtomicU64::new(0),
            session: Arc::new(Mutex::new(None)),
            buffer: Arc::new(StdMutex::new(TranscriptBuffer::new())),
            preview_tx,
            chunks_forwarded: Arc::new(AtomicUsize::new(0)),
            final_segments: Arc::new(AtomicUsize::new(0)),
            last_error: Arc::new(StdMutex::new(None)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Start a dictation session.
    ///
    /// No-op when a session is already requesting or recording. Acquires the
    /// microphone and the transcription channel concurrently under the
    /// configured timeout; recording begins only once both are ready. On
    /// partial failure the resource that did succeed is released and the
    /// manager moves to the error state.
    pub async fn start(&self) -> Result<(), DictationError> {
        match self.state.current() {
            SessionState::Requesting | SessionState::Recording | SessionState::Stopping => {
                debug!("start() ignored: session already active");
                return Ok(());
            }
            SessionState::Error => {
                return Err(DictationError::invalid_state("start", SessionState::Error));
            }
            SessionState::Idle => {}
        }

        if !self.state.try_transition(SessionState::Idle, SessionState::Requesting) {
            // Lost a race with a concurrent start.
            return Ok(());
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        info!("Acquiring microphone and transcription channel");

        let acquire = async {
            tokio::join!(
                self.capture.open(),
                self.connector.connect(&self.options.channel)
            )
        };

        let results = match tokio::time::timeout(self.options.connect_timeout, acquire).await {
            Ok(results) => results,
            Err(_) => {
                let err = DictationError::AcquireTimeout(self.options.connect_timeout);
                self.fail_requesting(&err);
                return Err(err);
            }
        };

        let (mut capture_handle, mut channel_handle) = match results {
            (Ok(capture), Ok(channel)) => (capture, channel),
            (Ok(mut capture), Err(e)) => {
                capture.close();
                self.fail_requesting(&e);
                return Err(e);
            }
            (Err(e), Ok(channel)) => {
                channel.close();
                self.fail_requesting(&e);
                return Err(e);
            }
            (Err(e), Err(channel_err)) => {
                debug!("Channel acquisition also failed: {}", channel_err);
                self.fail_requesting(&e);
                return Err(e);
            }
        };

        // A stop during acquisition bumped the generation or moved us out of
        // Requesting. Discard the late result instead of promoting it.
        let promoted = self.generation.load(Ordering::SeqCst) == generation
            && self
                .state
                .try_transition(SessionState::Requesting, SessionState::Recording);
        if !promoted {
            info!("Acquisition finished after cancellation, releasing resources");
            capture_handle.close();
            channel_handle.close();
            return Ok(());
        }

        let mut chunk_rx = match capture_handle.take_chunks() {
            Some(rx) => rx,
            None => {
                capture_handle.close();
                channel_handle.close();
                let err = DictationError::Channel("capture produced no chunk stream".to_string());
                self.fail_recording(&err).await;
                return Err(err);
            }
        };
        let mut events = match channel_handle.take_events() {
            Some(rx) => rx,
            None => {
                capture_handle.close();
                channel_handle.close();
                let err = DictationError::Channel("channel produced no event stream".to_string());
                self.fail_recording(&err).await;
                return Err(err);
            }
        };

        let session_id = Uuid::new_v4();
        let sender = channel_handle.sender();

        self.chunks_forwarded.store(0, Ordering::SeqCst);
        self.final_segments.store(0, Ordering::SeqCst);

        // Register the session before the tasks run so that an immediate
        // channel error can release it.
        {
            let mut slot = self.session.lock().await;
            *slot = Some(ActiveSession {
                id: session_id,
                started_at: Utc::now(),
                capture: capture_handle,
                channel: channel_handle,
                audio_task: None,
                event_task: None,
            });
        }

        // Forward captured chunks into the channel. Ends when the capture
        // device closes its stream.
        let chunks_forwarded = Arc::clone(&self.chunks_forwarded);
        let audio_task = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                sender.send(chunk);
                chunks_forwarded.fetch_add(1, Ordering::SeqCst);
            }
            debug!("Audio forwarding task exited");
        });

        // Route transcript events: finals into the buffer, interims into the
        // ephemeral preview, terminal events into forced shutdown.
        let buffer = Arc::clone(&self.buffer);
        let preview = self.preview_tx.clone();
        let final_segments = Arc::clone(&self.final_segments);
        let state = self.state.clone();
        let last_error = Arc::clone(&self.last_error);
        let session_slot = Arc::clone(&self.session);
        let event_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ChannelEvent::Transcript(t) if t.is_final => {
                        if t.text.trim().is_empty() {
                            continue;
                        }
                        debug!("Committing final segment: {:?}", t.text);
                        buffer
                            .lock()
                            .expect("buffer mutex poisoned")
                            .append_final(&t.text);
                        final_segments.fetch_add(1, Ordering::SeqCst);
                        preview.send_replace(String::new());
                    }
                    ChannelEvent::Transcript(t) => {
                        preview.send_replace(t.text);
                    }
                    ChannelEvent::Closed => {
                        // Normal during Stopping; mid-recording it means the
                        // backend dropped us.
                        if state.try_transition(SessionState::Recording, SessionState::Error) {
                            warn!("Channel closed unexpectedly mid-recording");
                            *last_error.lock().expect("error mutex poisoned") =
                                Some("transcription channel closed unexpectedly".to_string());
                            release_slot(&session_slot).await;
                        }
                        break;
                    }
                    ChannelEvent::Error(msg) => {
                        if state.try_transition(SessionState::Recording, SessionState::Error) {
                            warn!("Channel failed mid-stream: {}", msg);
                            *last_error.lock().expect("error mutex poisoned") = Some(msg);
                            release_slot(&session_slot).await;
                        }
                        break;
                    }
                }
            }
            debug!("Event routing task exited");
        });

        {
            let mut slot = self.session.lock().await;
            match slot.as_mut() {
                Some(sess) => {
                    sess.audio_task = Some(audio_task);
                    sess.event_task = Some(event_task);
                }
                None => {
                    // The session was already torn down by an error event.
                    audio_task.abort();
                    event_task.abort();
                }
            }
        }

        info!("Dictation session {} recording", session_id);
        Ok(())
    }

    /// Stop the current session.
    ///
    /// No-op when idle. During acquisition this cancels the in-flight
    /// handshake; while recording it stops forwarding audio, finishes the
    /// channel so in-flight audio flushes, and releases the capture device.
    pub async fn stop(&self) -> Result<(), DictationError> {
        match self.state.current() {
            SessionState::Idle | SessionState::Error | SessionState::Stopping => {
                debug!("stop() ignored in state {}", self.state.current());
                return Ok(());
            }
            SessionState::Requesting => {
                self.generation.fetch_add(1, Ordering::SeqCst);
                if self
                    .state
                    .try_transition(SessionState::Requesting, SessionState::Idle)
                {
                    info!("Cancelled session acquisition");
                }
                return Ok(());
            }
            SessionState::Recording => {}
        }

        if !self
            .state
            .try_transition(SessionState::Recording, SessionState::Stopping)
        {
            // Lost a race with a concurrent stop or a mid-stream error.
            return Ok(());
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        info!("Stopping dictation session");

        let sess = self.session.lock().await.take();
        if let Some(mut sess) = sess {
            sess.capture.close();
            sess.channel.finish();

            if let Some(task) = sess.audio_task.take() {
                join_task("audio forwarding", task).await;
            }
            if let Some(task) = sess.event_task.take() {
                join_task("event routing", task).await;
            }

            debug!("Session {} resources released", sess.id);
        }

        if self
            .state
            .try_transition(SessionState::Stopping, SessionState::Idle)
        {
            info!("Dictation session stopped");
        }
        Ok(())
    }

    /// Acknowledge a failure: return to idle, keeping whatever transcript was
    /// committed before the failure available for editing or insertion.
    pub async fn acknowledge_error(&self) -> Result<(), DictationError> {
        if !self
            .state
            .try_transition(SessionState::Error, SessionState::Idle)
        {
            debug!("acknowledge_error() ignored: not in error state");
            return Ok(());
        }

        *self.last_error.lock().expect("error mutex poisoned") = None;

        let sess = self.session.lock().await.take();
        if let Some(mut sess) = sess {
            sess.release();
        }

        info!("Error acknowledged, session reset (buffer preserved)");
        Ok(())
    }

    /// Type the buffer into the focused application.
    ///
    /// Trims the text and appends a single trailing space so subsequent
    /// dictation lands with natural word spacing. On success the buffer and
    /// preview are fully reset; on failure both are left untouched so the
    /// user can retry or copy instead.
    ///
    /// The reset compares against the snapshot that was typed: text committed
    /// while the injector was running is kept rather than discarded.
    pub async fn insert(&self) -> Result<(), DictationError> {
        let snapshot = self.buffer.lock().expect("buffer mutex poisoned").read();
        let trimmed = snapshot.trim().to_string();
        if trimmed.is_empty() {
            debug!("insert() ignored: buffer is empty");
            return Ok(());
        }

        let payload = format!("{} ", trimmed);
        let injector = Arc::clone(&self.injector);
        let result = tokio::task::spawn_blocking(move || {
            injector
                .lock()
                .expect("injector mutex poisoned")
                .type_text(&payload)
        })
        .await
        .map_err(|e| DictationError::Injection(format!("injection task failed: {}", e)))?;

        match result {
            Ok(()) => {
                let mut buffer = self.buffer.lock().expect("buffer mutex poisoned");
                if buffer.read() == snapshot {
                    buffer.clear();
                    drop(buffer);
                    self.final_segments.store(0, Ordering::SeqCst);
                    self.preview_tx.send_replace(String::new());
                    info!("Buffer inserted into focused application and cleared");
                } else {
                    warn!("Buffer changed while typing, keeping the new content");
                }
                Ok(())
            }
            Err(e) => {
                warn!("Insert failed, buffer preserved: {}", e);
                Err(e)
            }
        }
    }

    /// Copy the buffer to the clipboard. The buffer is left untouched.
    pub async fn copy(&self) -> Result<(), DictationError> {
        let text = self.buffer.lock().expect("buffer mutex poisoned").read();
        tokio::task::spawn_blocking(move || crate::inject::copy_to_clipboard(&text))
            .await
            .map_err(|e| DictationError::Clipboard(e.to_string()))?
    }

    /// Current committed buffer text.
    pub fn buffer_text(&self) -> String {
        self.buffer.lock().expect("buffer mutex poisoned").read()
    }

    /// Direct user edit: replaces the buffer wholesale. Later final segments
    /// append after this text rather than overwriting it.
    pub fn edit_buffer(&self, text: &str) {
        self.buffer
            .lock()
            .expect("buffer mutex poisoned")
            .set_user_text(text);
    }

    /// Clear the buffer and the interim preview.
    pub fn clear_buffer(&self) {
        self.buffer.lock().expect("buffer mutex poisoned").clear();
        self.final_segments.store(0, Ordering::SeqCst);
        self.preview_tx.send_replace(String::new());
    }

    /// Latest interim hypothesis (display-only, never committed).
    pub fn interim_preview(&self) -> String {
        self.preview_tx.borrow().clone()
    }

    /// Subscribe to interim preview updates.
    pub fn subscribe_preview(&self) -> watch::Receiver<String> {
        self.preview_tx.subscribe()
    }

    /// Snapshot for status queries.
    pub async fn stats(&self) -> SessionStats {
        let (session_id, started_at) = {
            let slot = self.session.lock().await;
            match slot.as_ref() {
                Some(sess) => (Some(sess.id), Some(sess.started_at)),
                None => (None, None),
            }
        };

        SessionStats {
            state: self.state.current(),
            session_id,
            started_at,
            duration_secs: started_at
                .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0),
            chunks_forwarded: self.chunks_forwarded.load(Ordering::SeqCst),
            final_segments: self.final_segments.load(Ordering::SeqCst),
            buffer_chars: self.buffer_text().chars().count(),
            interim_preview: self.interim_preview(),
            last_error: self
                .last_error
                .lock()
                .expect("error mutex poisoned")
                .clone(),
        }
    }

    /// Record a failed acquisition: Requesting -> Error, buffer untouched.
    fn fail_requesting(&self, err: &DictationError) {
        error!("Session acquisition failed: {}", err);
        *self.last_error.lock().expect("error mutex poisoned") = Some(err.to_string());
        self.state
            .try_transition(SessionState::Requesting, SessionState::Error);
    }

    /// Record a failure after promotion to Recording.
    async fn fail_recording(&self, err: &DictationError) {
        error!("Session failed: {}", err);
        *self.last_error.lock().expect("error mutex poisoned") = Some(err.to_string());
        release_slot(&self.session).await;
        self.state
            .try_transition(SessionState::Recording, SessionState::Error);
    }
}

/// Tear down whatever session currently occupies the slot.
async fn release_slot(slot: &Arc<Mutex<Option<ActiveSession>>>) {
    let sess = slot.lock().await.take();
    if let Some(mut sess) = sess {
        sess.release();
    }
}

/// Wait briefly for a task to wind down, aborting it if it does not.
async fn join_task(name: &str, task: JoinHandle<()>) {
    let abort = task.abort_handle();
    match tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_cancelled() => {}
        Ok(Err(e)) => error!("{} task panicked: {}", name, e),
        Err(_) => {
            warn!("{} task did not shut down in time, aborting", name);
            abort.abort();
        }
    }
}
