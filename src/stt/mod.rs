//! Streaming speech-to-text channel.

pub mod channel;
pub mod messages;

pub use channel::{
    ChannelConfig, ChannelEvent, ChannelHandle, ChannelSender, DeepgramConnector, TranscriptEvent,
    TranscriptionConnector,
};
pub use messages::{ControlMessage, StreamingResponse};
