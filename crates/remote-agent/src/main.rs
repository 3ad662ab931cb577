//! Remote desktop agent: entry point.
//!
//! Runs on the machine being controlled.  It keeps one relay connection open
//! for the life of the process, streams the primary display to whichever
//! viewer starts a session, and replays that viewer's mouse and keyboard
//! commands locally.
//!
//! # Usage
//!
//! ```text
//! remote-agent [OPTIONS]
//!
//! Options:
//!   --config     <PATH>  Config file [default: platform config dir]
//!   --relay-url  <URL>   Relay WebSocket URL (overrides the config file)
//!   --device-id  <ID>    Device identity (overrides the config file)
//!   --fps        <N>     Capture frame rate (overrides the config file)
//!   --log-level  <LVL>   tracing filter when RUST_LOG is unset
//! ```
//!
//! # Startup sequence
//!
//! 1. Load (or create) the TOML config; apply CLI overrides.
//! 2. Initialise `tracing`.
//! 3. Open the native screen grabber and input emulator.
//! 4. Start the relay link; it reconnects on its own from here on.
//! 5. Route link events, peer-channel text and Ctrl+C until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use remote_agent::application::dispatch::AgentDispatcher;
use remote_agent::application::inject_input::InputInjector;
use remote_agent::application::session_coordinator::{SessionCoordinator, SessionEvent};
use remote_agent::infrastructure::encoder::JpegFrameEncoder;
use remote_agent::infrastructure::input_emulation::native_emulator;
use remote_agent::infrastructure::resume::{spawn_resume_watcher, DEFAULT_PERIOD, DEFAULT_TOLERANCE};
use remote_agent::infrastructure::screen_capture::native_grabber;
use remote_agent::infrastructure::storage::config::{config_file_path, load_or_init, AgentConfig};
use remote_link::peer::default_connector;
use remote_link::{MessageSink, TransportLink, WsConnector};

/// Capacity of the channel carrying text received on the peer channel.
const PEER_INBOUND_CAPACITY: usize = 64;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote desktop agent.
///
/// Values given here override the config file for this run only; they are
/// not written back.
#[derive(Debug, Parser)]
#[command(
    name = "remote-agent",
    about = "Streams this desktop to a remote viewer and replays its input",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "REMOTE_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Relay WebSocket URL, e.g. `wss://relay.example.com/ws`.
    #[arg(long, env = "REMOTE_AGENT_RELAY_URL")]
    relay_url: Option<String>,

    /// Device identity announced to the relay.
    #[arg(long, env = "REMOTE_AGENT_DEVICE_ID")]
    device_id: Option<String>,

    /// Capture frame rate.
    #[arg(long, env = "REMOTE_AGENT_FPS")]
    fps: Option<u32>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "REMOTE_AGENT_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Overlays the CLI values onto a loaded config.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero frame rate or a blank relay URL.
    fn apply_to(self, config: &mut AgentConfig) -> anyhow::Result<()> {
        if let Some(url) = self.relay_url {
            anyhow::ensure!(!url.trim().is_empty(), "--relay-url must not be empty");
            config.relay.url = url;
        }
        if let Some(id) = self.device_id {
            config.agent.device_id = id;
        }
        if let Some(fps) = self.fps {
            anyhow::ensure!(fps > 0, "--fps must be at least 1");
            config.capture.fps = fps;
        }
        if let Some(level) = self.log_level {
            config.agent.log_level = level;
        }
        Ok(())
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let config_path = match cli.config.take() {
        Some(path) => path,
        None => config_file_path().context("locating the config directory")?,
    };
    let mut config = load_or_init(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    cli.apply_to(&mut config)?;
    config.ensure_device_id();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.agent.log_level)),
        )
        .init();

    info!(
        device_id = %config.agent.device_id,
        relay = %config.relay.url,
        config = %config_path.display(),
        "remote agent starting"
    );

    // Platform adapters.  Failing here is fatal: an agent that cannot see or
    // drive the desktop has nothing to offer a viewer.
    let grabber = native_grabber().context("opening the primary display")?;
    let emulator = native_emulator().context("initialising input injection")?;
    let encoder = Arc::new(JpegFrameEncoder::new(config.capture.jpeg_quality));

    let link = TransportLink::new(
        config.link_config(),
        Arc::new(WsConnector::new(config.relay.outbound_queue_depth)),
    );
    let sink: Arc<dyn MessageSink> = link.clone();

    let (coordinator, mut session_events) =
        SessionCoordinator::new(grabber, encoder, Arc::clone(&sink), config.capture_settings());
    let coordinator = Arc::new(coordinator);
    let injector = InputInjector::new(emulator, coordinator.subscribe());

    let (peer_tx, mut peer_rx) = mpsc::channel::<String>(PEER_INBOUND_CAPACITY);
    let mut dispatcher = AgentDispatcher::new(
        config.agent.device_id.clone(),
        Arc::clone(&coordinator),
        injector,
        sink,
        default_connector(config.peer.enabled, &config.peer.ice_servers),
        peer_tx,
    );

    let mut link_events = link.start();

    let resume_link = Arc::clone(&link);
    let resume_watcher = spawn_resume_watcher(DEFAULT_PERIOD, DEFAULT_TOLERANCE, move |_gap| {
        resume_link.notify_network_change();
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = link_events.recv() => match event {
                Some(event) => dispatcher.handle_link_event(event).await,
                None => {
                    warn!("relay link closed its event stream");
                    break;
                }
            },
            Some(text) = peer_rx.recv() => dispatcher.handle_peer_text(&text),
            Some(event) = session_events.recv() => match event {
                SessionEvent::Started(info) => info!(
                    session_id = %info.session_id,
                    width = info.target.width,
                    height = info.target.height,
                    "streaming started"
                ),
                SessionEvent::Stopped { session_id } => {
                    info!(%session_id, "streaming stopped");
                }
            },
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("failed to listen for Ctrl+C: {e}");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Transport teardown ends any session, then the link itself.
    dispatcher.shutdown().await;
    resume_watcher.abort();
    link.shutdown();

    info!("remote agent stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
