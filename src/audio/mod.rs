pub mod capture;
pub mod microphone;

pub use capture::{AudioCapture, AudioChunk, CaptureHandle};
pub use microphone::MicrophoneCapture;
