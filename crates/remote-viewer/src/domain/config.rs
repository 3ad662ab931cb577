//! Viewer runtime configuration.
//!
//! [`ViewerConfig`] is a plain struct.  `main` fills it from CLI arguments and
//! environment variables; tests build it with struct-update syntax over
//! [`ViewerConfig::default`].

use std::path::PathBuf;
use std::time::Duration;

use remote_link::LinkConfig;

/// Pointer-move commands closer together than this are dropped.
pub const DEFAULT_MOVE_THROTTLE: Duration = Duration::from_millis(50);

/// Everything one viewer run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// WebSocket URL of the relay.
    pub relay_url: String,

    /// Agent to control.
    pub device_id: String,

    /// Identifier for this viewing session.  Generated when not supplied.
    pub session_id: String,

    /// Size of the local drawing area, in local units.  Auto-fit scales the
    /// canvas to fit inside it.
    pub viewport_width: f64,
    pub viewport_height: f64,

    /// Where the file renderer writes the most recent frame.
    pub output_path: PathBuf,

    /// Try to open a peer channel for input commands.
    pub peer_enabled: bool,
    pub ice_servers: Vec<String>,

    /// Upper bound on waiting for the relay connection during open.
    pub connect_timeout: Duration,

    /// Upper bound on peer negotiation.  The session stays relay-only if the
    /// channel is not open by then.
    pub negotiation_timeout: Duration,

    /// Minimum spacing between forwarded pointer moves.
    pub move_throttle: Duration,
}

impl ViewerConfig {
    /// Link settings for this viewer's own relay connection.
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            relay_url: self.relay_url.clone(),
            connect_timeout: self.connect_timeout,
            ..LinkConfig::default()
        }
    }
}

impl Default for ViewerConfig {
    /// | Field               | Default                    |
    /// |---------------------|----------------------------|
    /// | relay_url           | `ws://127.0.0.1:8080/ws`   |
    /// | viewport            | 1280 × 720                 |
    /// | output_path         | `remote-frame.jpg`         |
    /// | peer_enabled        | `true`                     |
    /// | connect_timeout     | 10 s                       |
    /// | negotiation_timeout | 10 s                       |
    /// | move_throttle       | 50 ms                      |
    fn default() -> Self {
        Self {
            relay_url: LinkConfig::default().relay_url,
            device_id: String::new(),
            session_id: uuid::Uuid::new_v4().to_string(),
            viewport_width: 1280.0,
            viewport_height: 720.0,
            output_path: PathBuf::from("remote-frame.jpg"),
            peer_enabled: true,
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            connect_timeout: Duration::from_secs(10),
            negotiation_timeout: Duration::from_secs(10),
            move_throttle: DEFAULT_MOVE_THROTTLE,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
