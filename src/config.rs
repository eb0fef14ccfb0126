use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::session::SessionOptions;
use crate::stt::ChannelConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioSettings,
    pub stt: SttConfig,
    pub inject: InjectConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Capture-side audio parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioSettings {
    /// Sample rate of chunks sent to the backend.
    pub sample_rate: u32,
    /// Channel count after downmix (the backend expects mono).
    pub channels: u16,
    /// Chunk cadence in milliseconds.
    pub chunk_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    /// WebSocket endpoint of the transcription backend.
    pub url: String,
    /// Pre-shared credential. Usually supplied via TALKTYPE__STT__API_KEY.
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub smart_format: bool,
    pub interim_results: bool,
    /// Upper bound on mic + channel acquisition, in seconds.
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InjectConfig {
    /// Delay before typing, giving the user time to focus the target app.
    pub focus_delay_ms: u64,
}

impl Config {
    /// Load configuration from an optional file plus `TALKTYPE__*`
    /// environment overrides, on top of built-in defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "talktype")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8470)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.channels", 1)?
            .set_default("audio.chunk_ms", 250)?
            .set_default("stt.url", "wss://api.deepgram.com/v1/listen")?
            .set_default("stt.api_key", "")?
            .set_default("stt.model", "nova-2")?
            .set_default("stt.language", "en-US")?
            .set_default("stt.smart_format", true)?
            .set_default("stt.interim_results", true)?
            .set_default("stt.connect_timeout_secs", 12)?
            .set_default("inject.focus_delay_ms", 300)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("TALKTYPE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Channel connection parameters derived from the stt section.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            model: self.stt.model.clone(),
            language: self.stt.language.clone(),
            smart_format: self.stt.smart_format,
            interim_results: self.stt.interim_results,
            encoding: "linear16".to_string(),
            sample_rate: self.audio.sample_rate,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            channel: self.channel_config(),
            connect_timeout: Duration::from_secs(self.stt.connect_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_config_file() {
        let cfg = Config::load("config/does-not-exist").unwrap();
        assert_eq!(cfg.service.name, "talktype");
        assert_eq!(cfg.audio.sample_rate, 16000);
        assert_eq!(cfg.audio.chunk_ms, 250);
        assert!(cfg.stt.interim_results);
    }

    #[test]
    fn channel_config_follows_audio_settings() {
        let mut cfg = Config::load("config/does-not-exist").unwrap();
        cfg.audio.sample_rate = 8000;
        let channel = cfg.channel_config();
        assert_eq!(channel.sample_rate, 8000);
        assert_eq!(channel.encoding, "linear16");
    }
}
