//! cpal microphone backend.
//!
//! The cpal input stream is not `Send`, so capture runs on a dedicated OS
//! thread. The stream callback accumulates samples, downmixes to mono,
//! linearly resamples to the target rate, and emits fixed-cadence PCM chunks
//! into a tokio channel. The thread parks until it is told to stop, then
//! drops the stream, which releases the device.

use std::sync::mpsc as std_mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::capture::{AudioCapture, AudioChunk, CaptureHandle};
use crate::config::AudioSettings;
use crate::error::DictationError;

/// How many chunks may sit in the outbound queue before new ones are dropped.
const CHUNK_QUEUE_DEPTH: usize = 32;

/// Microphone capture via the platform's default input device.
pub struct MicrophoneCapture {
    settings: AudioSettings,
}

impl MicrophoneCapture {
    pub fn new(settings: AudioSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl AudioCapture for MicrophoneCapture {
    async fn open(&self) -> Result<CaptureHandle, DictationError> {
        let settings = self.settings.clone();

        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (thread_stop_tx, thread_stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), DictationError>>();

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || capture_thread(settings, chunk_tx, thread_stop_rx, ready_tx))
            .map_err(|e| DictationError::DeviceUnavailable(e.to_string()))?;

        // Relay the async stop signal (or handle drop) to the capture thread.
        tokio::spawn(async move {
            let _ = stop_rx.await;
            let _ = thread_stop_tx.send(());
        });

        // Wait for the thread to report that the stream is running.
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| DictationError::DeviceUnavailable(e.to_string()))?;

        match ready {
            Ok(Ok(())) => {
                info!("Microphone capture started");
                Ok(CaptureHandle::new(chunk_rx, stop_tx))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DictationError::DeviceUnavailable(
                "capture thread exited before the stream started".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Body of the capture thread. Owns the cpal stream for its whole lifetime.
fn capture_thread(
    settings: AudioSettings,
    chunk_tx: mpsc::Sender<AudioChunk>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: std_mpsc::Sender<Result<(), DictationError>>,
) {
    let host = cpal::default_host();

    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(DictationError::DeviceUnavailable(
                "no default input device".to_string(),
            )));
            return;
        }
    };

    let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());

    let input_config = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(classify_device_error(&e.to_string())));
            return;
        }
    };

    let input_rate = input_config.sample_rate().0;
    let input_channels = input_config.channels();
    let sample_format = input_config.sample_format();
    let stream_config: cpal::StreamConfig = input_config.into();

    info!(
        "Opening input device '{}' ({} Hz, {} ch, {:?})",
        device_name, input_rate, input_channels, sample_format
    );

    let mut chunker = Chunker::new(
        input_rate,
        input_channels,
        settings.sample_rate,
        settings.chunk_ms,
        chunk_tx,
    );

    let err_fn = |e| warn!("Audio stream error: {}", e);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| chunker.push(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                chunker.push(&floats);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(DictationError::DeviceUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(classify_device_error(&e.to_string())));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(classify_device_error(&e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    // Park until stop is requested or the handle is dropped. Dropping the
    // stream on the way out releases the input device.
    let _ = stop_rx.recv();
    drop(stream);
    debug!("Capture thread for '{}' exited", device_name);
}

/// Distinguish an OS permission refusal from a missing or busy device.
fn classify_device_error(description: &str) -> DictationError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted") {
        DictationError::PermissionDenied
    } else {
        DictationError::DeviceUnavailable(description.to_string())
    }
}

/// Accumulates interleaved input samples and emits fixed-cadence mono chunks.
struct Chunker {
    input_rate: u32,
    input_channels: u16,
    target_rate: u32,
    samples_per_chunk: usize,
    accumulator: Vec<f32>,
    sequence: u64,
    chunk_tx: mpsc::Sender<AudioChunk>,
}

impl Chunker {
    fn new(
        input_rate: u32,
        input_channels: u16,
        target_rate: u32,
        chunk_ms: u64,
        chunk_tx: mpsc::Sender<AudioChunk>,
    ) -> Self {
        let samples_per_chunk =
            (input_rate as u64 * input_channels as u64 * chunk_ms / 1000) as usize;
        Self {
            input_rate,
            input_channels,
            target_rate,
            samples_per_chunk: samples_per_chunk.max(1),
            accumulator: Vec::with_capacity(samples_per_chunk.max(1) * 2),
            sequence: 0,
            chunk_tx,
        }
    }

    fn push(&mut self, data: &[f32]) {
        self.accumulator.extend_from_slice(data);

        while self.accumulator.len() >= self.samples_per_chunk {
            let frame: Vec<f32> = self.accumulator.drain(..self.samples_per_chunk).collect();
            let mono = downmix_to_mono(&frame, self.input_channels);
            let resampled = resample_linear(&mono, self.input_rate, self.target_rate);
            let data = pcm_bytes(&resampled);

            let chunk = AudioChunk {
                data,
                sequence: self.sequence,
            };
            self.sequence += 1;

            // Drop the chunk when the consumer is not keeping up; live audio
            // is worthless once it is stale.
            if self.chunk_tx.try_send(chunk).is_err() {
                debug!("Chunk queue full, dropping audio chunk");
            }
        }
    }
}

/// Average interleaved channels down to mono.
fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Downsample to the exact target rate by linear interpolation.
///
/// The output length is `len * to_rate / from_rate`, so one second of input
/// is always one second of output regardless of the device rate (44100 Hz
/// input yields a true 16000 Hz stream, not a 22050 Hz one). Upsampling is
/// not supported; the input is returned unchanged when the target rate is
/// not lower.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate <= to_rate || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx];
        let b = if idx + 1 < samples.len() {
            samples[idx + 1]
        } else {
            a
        };
        out.push(a + (b - a) * frac);
    }
    out
}

/// Convert f32 samples to little-endian 16-bit PCM bytes.
fn pcm_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}
