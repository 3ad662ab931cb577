//! Remote desktop viewer: headless entry point.
//!
//! Opens one session against one agent, writes the most recent frame to a
//! file and reads operator input from stdin (see
//! [`remote_viewer::infrastructure::console`] for the command syntax).
//!
//! # Usage
//!
//! ```text
//! remote-viewer --device-id <ID> [OPTIONS]
//!
//! Options:
//!   --relay-url           <URL>   Relay WebSocket URL [default: ws://127.0.0.1:8080/ws]
//!   --device-id           <ID>    Agent to control (required)
//!   --session-id          <ID>    Session identifier [default: random UUID]
//!   --viewport-width      <PX>    Local drawing area width  [default: 1280]
//!   --viewport-height     <PX>    Local drawing area height [default: 720]
//!   --output              <PATH>  File the latest frame is written to [default: remote-frame.jpg]
//!   --no-peer                     Never negotiate a peer channel
//!   --ice-server          <URL>   STUN/TURN server, repeatable
//!   --connect-timeout     <SECS>  [default: 10]
//!   --negotiation-timeout <SECS>  [default: 10]
//!   --move-throttle-ms    <MS>    [default: 50]
//!   --log-level           <LVL>   tracing filter when RUST_LOG is unset [default: info]
//! ```
//!
//! The viewer runs on a single-threaded runtime: link events, console input
//! and Ctrl+C are multiplexed in one `select!` loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use remote_link::peer::default_connector;
use remote_link::{MessageSink, TransportLink, WsConnector};
use remote_viewer::application::viewer_session::{InputOutcome, ViewerSession};
use remote_viewer::domain::ViewerConfig;
use remote_viewer::infrastructure::console::{parse_line, ConsoleCommand};
use remote_viewer::infrastructure::renderer::FileFrameRenderer;

/// Time given to the stop notice and peer release before the link closes.
const CLOSE_GRACE: Duration = Duration::from_millis(250);

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "remote-viewer",
    about = "Views and controls a remote desktop through the relay",
    version
)]
struct Cli {
    /// Relay WebSocket URL.
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws", env = "REMOTE_VIEWER_RELAY_URL")]
    relay_url: String,

    /// Device id of the agent to control.
    #[arg(long, env = "REMOTE_VIEWER_DEVICE_ID")]
    device_id: String,

    /// Session identifier.  A random UUID when omitted.
    #[arg(long, env = "REMOTE_VIEWER_SESSION_ID")]
    session_id: Option<String>,

    #[arg(long, default_value_t = 1280.0)]
    viewport_width: f64,

    #[arg(long, default_value_t = 720.0)]
    viewport_height: f64,

    /// File the most recent frame is written to.
    #[arg(long, default_value = "remote-frame.jpg", env = "REMOTE_VIEWER_OUTPUT")]
    output: PathBuf,

    /// Send input over the relay only.
    #[arg(long)]
    no_peer: bool,

    /// STUN/TURN server for peer negotiation.  Repeatable.
    #[arg(long = "ice-server")]
    ice_servers: Vec<String>,

    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    #[arg(long, default_value_t = 10)]
    negotiation_timeout: u64,

    /// Minimum spacing between forwarded pointer moves.
    #[arg(long, default_value_t = 50)]
    move_throttle_ms: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "REMOTE_VIEWER_LOG_LEVEL")]
    log_level: String,
}

impl Cli {
    /// Converts the parsed arguments into a [`ViewerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error for an empty device id or a non-positive viewport.
    fn into_viewer_config(self) -> anyhow::Result<ViewerConfig> {
        anyhow::ensure!(!self.device_id.trim().is_empty(), "--device-id must not be empty");
        anyhow::ensure!(
            self.viewport_width > 0.0 && self.viewport_height > 0.0,
            "viewport must be larger than 0x0, got {}x{}",
            self.viewport_width,
            self.viewport_height
        );

        let defaults = ViewerConfig::default();
        Ok(ViewerConfig {
            relay_url: self.relay_url,
            device_id: self.device_id,
            session_id: self.session_id.unwrap_or(defaults.session_id),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            output_path: self.output,
            peer_enabled: !self.no_peer,
            ice_servers: if self.ice_servers.is_empty() {
                defaults.ice_servers
            } else {
                self.ice_servers
            },
            connect_timeout: Duration::from_secs(self.connect_timeout),
            negotiation_timeout: Duration::from_secs(self.negotiation_timeout),
            move_throttle: Duration::from_millis(self.move_throttle_ms),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = cli.into_viewer_config().context("invalid viewer arguments")?;
    info!(
        relay = %config.relay_url,
        device_id = %config.device_id,
        session_id = %config.session_id,
        "remote viewer starting"
    );

    let link = TransportLink::new(config.link_config(), Arc::new(WsConnector::default()));
    let mut link_events = link.start();
    let sink: Arc<dyn MessageSink> = link.clone();

    let mut session = ViewerSession::new(
        &config,
        sink,
        default_connector(config.peer_enabled, &config.ice_servers),
        Box::new(FileFrameRenderer::new(&config.output_path)),
    );

    if let Err(e) = session.open(&mut link_events).await {
        link.shutdown();
        return Err(e).context("could not start the remote session");
    }
    info!(
        output = %config.output_path.display(),
        "session open; type commands (move, click, key, text, wheel, fit, quit)"
    );

    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = link_events.recv() => match event {
                Some(event) => session.handle_link_event(event),
                None => {
                    warn!("relay link closed");
                    break;
                }
            },
            line = console.next_line(), if console_open => match line {
                Ok(Some(line)) => {
                    if !run_console_line(&mut session, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("console closed; streaming until Ctrl+C");
                    console_open = false;
                }
                Err(e) => {
                    warn!("console read failed: {e}");
                    console_open = false;
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

    session.close();
    tokio::time::sleep(CLOSE_GRACE).await;
    link.shutdown();
    Ok(())
}

/// Applies one console line.  Returns `false` when the session should end.
fn run_console_line(session: &mut ViewerSession, line: &str) -> bool {
    match parse_line(line) {
        Ok(None) => true,
        Ok(Some(ConsoleCommand::Quit)) => false,
        Ok(Some(ConsoleCommand::Fit)) => {
            match session.fit_to_viewport() {
                Some(scale) => info!(scale, "canvas fitted"),
                None => warn!("nothing to fit before the first frame"),
            }
            true
        }
        Ok(Some(ConsoleCommand::Input(inputs))) => {
            for input in &inputs {
                match session.handle_local_input(input, Instant::now()) {
                    InputOutcome::CancelRequested => return false,
                    outcome => debug!(?input, ?outcome, "console input"),
                }
            }
            true
        }
        Err(e) => {
            warn!("{e}");
            true
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        // Arrange
        let cli = Cli::parse_from(["remote-viewer", "--device-id", "agent-1"]);

        // Act
        let cfg = cli.into_viewer_config().unwrap();

        // Assert
        assert_eq!(cfg.relay_url, "ws://127.0.0.1:8080/ws");
        assert_eq!(cfg.device_id, "agent-1");
        assert_eq!((cfg.viewport_width, cfg.viewport_height), (1280.0, 720.0));
        assert!(cfg.peer_enabled);
        assert_eq!(cfg.move_throttle, Duration::from_millis(50));
        assert!(!cfg.session_id.is_empty());
        assert!(!cfg.ice_servers.is_empty());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "remote-viewer",
            "--device-id",
            "agent-1",
            "--session-id",
            "s-9",
            "--no-peer",
            "--ice-server",
            "stun:a",
            "--ice-server",
            "stun:b",
            "--move-throttle-ms",
            "20",
        ]);
        let cfg = cli.into_viewer_config().unwrap();
        assert_eq!(cfg.session_id, "s-9");
        assert!(!cfg.peer_enabled);
        assert_eq!(cfg.ice_servers, vec!["stun:a".to_string(), "stun:b".to_string()]);
        assert_eq!(cfg.move_throttle, Duration::from_millis(20));
    }

    #[test]
    fn test_cli_rejects_zero_viewport() {
        let cli = Cli::parse_from(["remote-viewer", "--device-id", "a", "--viewport-width", "0"]);
        assert!(cli.into_viewer_config().is_err());
    }

    #[test]
    fn test_cli_rejects_blank_device_id() {
        let cli = Cli::parse_from(["remote-viewer", "--device-id", " "]);
        assert!(cli.into_viewer_config().is_err());
    }
}
