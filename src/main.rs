use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use talktype::audio::AudioCapture;
use talktype::inject::EnigoInjector;
use talktype::stt::DeepgramConnector;
use talktype::{create_router, AppState, Config, DictationSessionManager, MicrophoneCapture};

#[derive(Debug, Parser)]
#[command(name = "talktype", about = "Push-to-talk dictation service")]
struct Args {
    /// Config file path (without extension)
    #[arg(long, default_value = "config/talktype")]
    config: String,

    /// Override the HTTP port from the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    if cfg.stt.api_key.is_empty() {
        warn!("No transcription API key configured; set TALKTYPE__STT__API_KEY");
    }

    let capture: Arc<dyn AudioCapture> = Arc::new(MicrophoneCapture::new(cfg.audio.clone()));
    let connector = Arc::new(DeepgramConnector::new(
        cfg.stt.url.clone(),
        cfg.stt.api_key.clone(),
    ));
    let injector = Box::new(EnigoInjector::new(Duration::from_millis(
        cfg.inject.focus_delay_ms,
    )));

    let manager = Arc::new(DictationSessionManager::new(
        capture,
        connector,
        injector,
        cfg.session_options(),
    ));

    let app = create_router(AppState::new(manager));
    let addr = format!("{}:{}", cfg.service.http.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP control API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
