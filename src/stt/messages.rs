use serde::{Deserialize, Serialize};

/// Streaming transcript event received from the backend.
///
/// The backend sends JSON objects shaped like:
/// `{"channel": {"alternatives": [{"transcript": "..."}]}, "is_final": true}`.
/// Fields we do not consume (timings, confidence, metadata) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct StreamingResponse {
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub channel: ChannelPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelPayload {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,
}

impl StreamingResponse {
    /// Best hypothesis text, or empty when the event carries none.
    pub fn transcript(&self) -> &str {
        self.channel
            .alternatives
            .first()
            .map(|a| a.transcript.as_str())
            .unwrap_or("")
    }
}

/// Control message sent to the backend over the open socket.
#[derive(Debug, Serialize)]
pub struct ControlMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
}

impl ControlMessage {
    /// Graceful half-close: tells the backend no more audio is coming so it
    /// can flush pending results and close the stream.
    pub fn close_stream() -> Self {
        Self {
            message_type: "CloseStream",
        }
    }
}
