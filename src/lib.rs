pub mod audio;
pub mod buffer;
pub mod config;
pub mod error;
pub mod http;
pub mod inject;
pub mod session;
pub mod stt;

pub use audio::{AudioCapture, AudioChunk, CaptureHandle, MicrophoneCapture};
pub use buffer::TranscriptBuffer;
pub use config::Config;
pub use error::DictationError;
pub use http::{create_router, AppState};
pub use inject::{copy_to_clipboard, EnigoInjector, TextInjector};
pub use session::{DictationSessionManager, SessionOptions, SessionState, SessionStats};
pub use stt::{
    ChannelConfig, ChannelEvent, ChannelHandle, ChannelSender, DeepgramConnector, TranscriptEvent,
    TranscriptionConnector,
};
