use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::DictationError;

/// A bounded slice of captured audio, forwarded to the transcription backend.
///
/// Chunks carry little-endian 16-bit mono PCM and a monotonically increasing
/// sequence index. Each chunk is consumed exactly once and never retained
/// after forwarding.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw PCM bytes (i16 little-endian, mono).
    pub data: Vec<u8>,
    /// Position of this chunk in the capture stream.
    pub sequence: u64,
}

/// Microphone capture source.
///
/// Implementations acquire the OS audio-input device and deliver chunks at a
/// fixed cadence through the returned [`CaptureHandle`]. The device must be
/// released on every exit path, which the handle's `close` guarantees.
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the input device and start capturing.
    ///
    /// Fails with `PermissionDenied` if the OS refuses microphone access, or
    /// `DeviceUnavailable` if no capture device can be opened.
    async fn open(&self) -> Result<CaptureHandle, DictationError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Owning handle for an active capture.
///
/// Dropping the handle (or calling `close`) releases the underlying device.
pub struct CaptureHandle {
    chunks: Option<mpsc::Receiver<AudioChunk>>,
    stop_tx: Option<oneshot::Sender<()>>,
    active: Arc<AtomicBool>,
}

impl CaptureHandle {
    /// Build a handle from its parts.
    ///
    /// `chunks` receives captured audio; dropping `stop_tx`'s receiver side or
    /// receiving on it must stop the capture and release the device.
    pub fn new(chunks: mpsc::Receiver<AudioChunk>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            chunks: Some(chunks),
            stop_tx: Some(stop_tx),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Take the chunk receiver. Yields `None` after the first call.
    pub fn take_chunks(&mut self) -> Option<mpsc::Receiver<AudioChunk>> {
        self.chunks.take()
    }

    /// Stop capturing and release the device. Idempotent.
    pub fn close(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            debug!("Closing audio capture");
            let _ = stop.send(());
        }
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("active", &self.is_active())
            .finish()
    }
}
