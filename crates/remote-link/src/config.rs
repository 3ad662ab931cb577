//! Transport link configuration.

use std::time::Duration;

/// Timing policy and relay address for a [`crate::TransportLink`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// WebSocket URL of the relay, e.g. `wss://relay.example.com/ws`.
    pub relay_url: String,
    /// Upper bound on one connect handshake.
    pub connect_timeout: Duration,
    /// How often the heartbeat loop checks for silence and sends a ping.
    pub heartbeat_interval: Duration,
    /// Silence longer than this forces a reconnect.
    pub liveness_timeout: Duration,
    /// First reconnect delay.
    pub backoff_base: Duration,
    /// Largest reconnect delay.
    pub backoff_cap: Duration,
    /// Minimum spacing between network-change reconnects.
    pub network_change_debounce: Duration,
    /// Capacity of the inbound event channel handed to the owner.
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8080/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(60),
            backoff_base: remote_core::domain::backoff::DEFAULT_BASE,
            backoff_cap: remote_core::domain::backoff::DEFAULT_CAP,
            network_change_debounce: Duration::from_secs(10),
            event_capacity: 256,
        }
    }
}
