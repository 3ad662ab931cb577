//! TOML configuration for the agent.
//!
//! Reads and writes [`AgentConfig`] at the platform config path:
//! - Windows:  `%APPDATA%\RemoteAgent\agent.toml`
//! - Linux:    `$XDG_CONFIG_HOME/remote-agent/agent.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/RemoteAgent/agent.toml`
//!
//! Example:
//!
//! ```toml
//! [agent]
//! device_id = "5b0f7c1e-..."
//! log_level = "info"
//! session_stale_after_secs = 120
//!
//! [relay]
//! url = "wss://relay.example.com/ws"
//! connect_timeout_secs = 10
//!
//! [capture]
//! fps = 15
//! jpeg_quality = 70
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section or
//! a config written by an older agent all load cleanly.  The device id is
//! generated and persisted on first run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use remote_link::LinkConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::session_coordinator::CaptureSettings;

const CONFIG_FILE_NAME: &str = "agent.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub peer: PeerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    /// Identity the relay routes by.  Empty means "generate on first run".
    #[serde(default)]
    pub device_id: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// A session whose viewer has sent nothing for this long may be
    /// replaced by a new registration.
    #[serde(default = "default_session_stale_after")]
    pub session_stale_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySection {
    #[serde(default = "default_relay_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_secs: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_secs: u64,
    #[serde(default = "default_network_debounce")]
    pub network_change_debounce_secs: u64,
    /// Messages buffered toward the socket before new ones are dropped.
    #[serde(default = "default_outbound_queue_depth")]
    pub outbound_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureSection {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerSection {
    /// Offer a peer channel to viewers (needs the `webrtc` build feature).
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_session_stale_after() -> u64 {
    120
}
fn default_relay_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_liveness_timeout() -> u64 {
    60
}
fn default_backoff_base() -> u64 {
    5
}
fn default_backoff_cap() -> u64 {
    60
}
fn default_network_debounce() -> u64 {
    10
}
fn default_outbound_queue_depth() -> usize {
    32
}
fn default_fps() -> u32 {
    15
}
fn default_max_width() -> u32 {
    remote_core::domain::frame::MAX_CAPTURE_WIDTH
}
fn default_max_height() -> u32 {
    remote_core::domain::frame::MAX_CAPTURE_HEIGHT
}
fn default_jpeg_quality() -> u8 {
    crate::infrastructure::encoder::DEFAULT_JPEG_QUALITY
}
fn default_true() -> bool {
    true
}
fn default_ice_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            log_level: default_log_level(),
            session_stale_after_secs: default_session_stale_after(),
        }
    }
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            connect_timeout_secs: default_connect_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            liveness_timeout_secs: default_liveness_timeout(),
            backoff_base_secs: default_backoff_base(),
            backoff_cap_secs: default_backoff_cap(),
            network_change_debounce_secs: default_network_debounce(),
            outbound_queue_depth: default_outbound_queue_depth(),
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for PeerSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ice_servers: default_ice_servers(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl AgentConfig {
    /// Timing policy for the transport link.
    ///
    /// Zero timings are raised to one second; a cap below the base is
    /// raised to the base.
    pub fn link_config(&self) -> LinkConfig {
        let r = &self.relay;
        let backoff_base = r.backoff_base_secs.max(1);
        LinkConfig {
            relay_url: r.url.clone(),
            connect_timeout: Duration::from_secs(r.connect_timeout_secs.max(1)),
            heartbeat_interval: Duration::from_secs(r.heartbeat_interval_secs.max(1)),
            liveness_timeout: Duration::from_secs(r.liveness_timeout_secs.max(1)),
            backoff_base: Duration::from_secs(backoff_base),
            backoff_cap: Duration::from_secs(r.backoff_cap_secs.max(backoff_base)),
            network_change_debounce: Duration::from_secs(r.network_change_debounce_secs),
            ..LinkConfig::default()
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            fps: self.capture.fps.max(1),
            max_width: self.capture.max_width,
            max_height: self.capture.max_height,
            stale_after: Duration::from_secs(self.agent.session_stale_after_secs.max(1)),
            ..CaptureSettings::default()
        }
    }

    /// Fills in a device id if none is set.  Returns `true` if one was made.
    pub fn ensure_device_id(&mut self) -> bool {
        if !self.agent.device_id.trim().is_empty() {
            return false;
        }
        self.agent.device_id = Uuid::new_v4().to_string();
        true
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Full path of the config file in the platform config directory.
///
/// # Errors
///
/// [`ConfigError::NoPlatformConfigDir`] if the base directory is unknown.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config at `path`, or defaults if the file does not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] for I/O failures other than "not found",
/// [`ConfigError::Parse`] for malformed TOML.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AgentConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories.
///
/// # Errors
///
/// [`ConfigError::Io`] or [`ConfigError::Serialize`].
pub fn save_config(path: &Path, config: &AgentConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the config and, on first run, generates and persists a device id.
///
/// # Errors
///
/// As [`load_config`] and [`save_config`].
pub fn load_or_init(path: &Path) -> Result<AgentConfig, ConfigError> {
    let mut config = load_config(path)?;
    if config.ensure_device_id() {
        save_config(path, &config)?;
        tracing::info!(
            device_id = %config.agent.device_id,
            path = %path.display(),
            "generated device id"
        );
    }
    Ok(config)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RemoteAgent"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("remote-agent"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RemoteAgent")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("remote_agent_test_{}", Uuid::new_v4()));
        let path = dir.join("nested").join(CONFIG_FILE_NAME);
        (dir, path)
    }

    #[test]
    fn test_defaults_match_link_and_capture_policy() {
        // Arrange
        let cfg = AgentConfig::default();

        // Act
        let link = cfg.link_config();
        let capture = cfg.capture_settings();

        // Assert
        assert_eq!(link, LinkConfig {
            relay_url: "ws://127.0.0.1:8080/ws".to_string(),
            ..LinkConfig::default()
        });
        assert_eq!(capture.fps, 15);
        assert_eq!((capture.max_width, capture.max_height), (1920, 1080));
        assert_eq!(cfg.capture.jpeg_quality, 70);
        assert_eq!(cfg.relay.outbound_queue_depth, 32);
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        // Arrange
        let text = r#"
            [relay]
            url = "wss://relay.example.com/ws"
            backoff_base_secs = 2

            [capture]
            fps = 5
        "#;

        // Act
        let cfg: AgentConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.relay.url, "wss://relay.example.com/ws");
        assert_eq!(cfg.link_config().backoff_base, Duration::from_secs(2));
        assert_eq!(cfg.relay.backoff_cap_secs, 60);
        assert_eq!(cfg.capture.fps, 5);
        assert_eq!(cfg.capture.jpeg_quality, 70);
        assert_eq!(cfg.agent.log_level, "info");
        assert!(cfg.peer.enabled);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        // Arrange
        let (dir, path) = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[relay\nurl = ").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/agent.toml");
        assert_eq!(load_config(&path).unwrap(), AgentConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let (dir, path) = temp_path();
        let mut cfg = AgentConfig::default();
        cfg.relay.url = "wss://relay.internal/ws".into();
        cfg.capture.fps = 8;
        cfg.peer.ice_servers = vec![];

        // Act
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_first_run_generates_and_persists_device_id() {
        // Arrange
        let (dir, path) = temp_path();

        // Act
        let first = load_or_init(&path).unwrap();
        let second = load_or_init(&path).unwrap();

        // Assert
        assert!(Uuid::parse_str(&first.agent.device_id).is_ok());
        assert_eq!(first.agent.device_id, second.agent.device_id);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_fps_is_raised_to_one() {
        let mut cfg = AgentConfig::default();
        cfg.capture.fps = 0;
        assert_eq!(cfg.capture_settings().fps, 1);
    }

    #[test]
    fn test_zero_link_timings_are_raised() {
        // Arrange
        let text = r#"
            [relay]
            connect_timeout_secs = 0
            liveness_timeout_secs = 0
            backoff_base_secs = 0
            backoff_cap_secs = 0
        "#;
        let cfg: AgentConfig = toml::from_str(text).unwrap();

        // Act
        let link = cfg.link_config();

        // Assert
        assert_eq!(link.connect_timeout, Duration::from_secs(1));
        assert_eq!(link.liveness_timeout, Duration::from_secs(1));
        assert_eq!(link.backoff_base, Duration::from_secs(1));
        assert_eq!(link.backoff_cap, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_cap_below_base_is_raised_to_base() {
        let mut cfg = AgentConfig::default();
        cfg.relay.backoff_base_secs = 10;
        cfg.relay.backoff_cap_secs = 3;
        assert_eq!(cfg.link_config().backoff_cap, Duration::from_secs(10));
    }

    #[test]
    fn test_stale_session_window_comes_from_agent_section() {
        // Arrange
        let cfg: AgentConfig = toml::from_str("[agent]\nsession_stale_after_secs = 0\n").unwrap();

        // Act
        let settings = cfg.capture_settings();

        // Assert
        assert_eq!(settings.stale_after, Duration::from_secs(1));
        assert_eq!(
            AgentConfig::default().capture_settings().stale_after,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_config_file_path_ends_with_agent_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
