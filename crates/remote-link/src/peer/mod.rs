//! Optional peer-to-peer command channel.
//!
//! The viewer offers, the agent answers.  Offer, answer and ICE candidates
//! travel through the relay as opaque `webrtc_*` payloads; the relay never
//! looks inside them.  Once the channel is open the viewer sends input
//! commands over it as the same JSON text it would send to the relay.
//! Frames never use this channel.
//!
//! Every failure here is soft.  A session whose negotiation fails, times out
//! or is unsupported simply keeps using the relay.
//!
//! ```text
//! viewer                       relay                       agent
//!   │ offer() ──webrtc_offer──────▶│──────webrtc_offer──────▶ answer()
//!   │ apply_answer() ◀─webrtc_answer◀───────webrtc_answer──── │
//!   │ ◀──────── webrtc_ice_candidate (both ways) ───────────▶ │
//!   │ ═══════════════ data channel: uem_remote_action ══════▶ │
//! ```

#[cfg(feature = "webrtc")]
pub mod rtc;

use std::sync::Arc;

use async_trait::async_trait;
use remote_core::protocol::messages::PeerSignal;
use remote_core::RelayMessage;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Lifecycle of one peer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Negotiating,
    Open,
    Closed,
}

/// Which relay message a negotiation payload belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// A negotiation payload the local side wants delivered to the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundSignal {
    pub kind: SignalKind,
    pub payload: Value,
}

impl OutboundSignal {
    /// Wraps the payload in the relay message for its kind.
    pub fn into_relay_message(self, session_id: &str, device_id: &str) -> RelayMessage {
        let signal = PeerSignal {
            session_id: session_id.to_string(),
            payload: self.payload,
            device_id: device_id.to_string(),
        };
        match self.kind {
            SignalKind::Offer => RelayMessage::WebrtcOffer(signal),
            SignalKind::Answer => RelayMessage::WebrtcAnswer(signal),
            SignalKind::IceCandidate => RelayMessage::WebrtcIceCandidate(signal),
        }
    }
}

#[derive(Debug, Error)]
pub enum PeerError {
    /// This build has no peer channel support.
    #[error("peer channel not supported in this build")]
    Unsupported,

    #[error("peer negotiation failed: {0}")]
    Negotiation(String),

    #[error("invalid negotiation payload: {0}")]
    InvalidPayload(String),

    #[error("peer channel is not open")]
    NotOpen,

    #[error("peer send failed: {0}")]
    Send(String),
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// One negotiated (or negotiating) peer channel.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    fn state(&self) -> PeerState;

    /// Sends one text message.
    ///
    /// # Errors
    ///
    /// [`PeerError::NotOpen`] unless the channel is Open.
    async fn send_text(&self, text: String) -> Result<(), PeerError>;

    /// Applies the remote answer (offering side only).
    async fn apply_answer(&self, answer: Value) -> Result<(), PeerError>;

    /// Adds a trickled ICE candidate from the remote side.
    async fn add_remote_candidate(&self, candidate: Value) -> Result<(), PeerError>;

    /// Releases every resource.  Idempotent.
    async fn close(&self);
}

/// Creates peer channels.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Starts negotiation as the offering side.
    ///
    /// The offer and local ICE candidates are pushed into `signals`.  Text
    /// received on the channel is pushed into `inbound`.
    async fn offer(
        &self,
        signals: mpsc::UnboundedSender<OutboundSignal>,
        inbound: mpsc::Sender<String>,
    ) -> Result<Arc<dyn PeerChannel>, PeerError>;

    /// Answers a remote offer.  The answer and local ICE candidates are
    /// pushed into `signals`.
    async fn answer(
        &self,
        offer: Value,
        signals: mpsc::UnboundedSender<OutboundSignal>,
        inbound: mpsc::Sender<String>,
    ) -> Result<Arc<dyn PeerChannel>, PeerError>;
}

// ── Relay-only connector ──────────────────────────────────────────────────────

/// Connector for builds or configurations without a peer channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPeerConnector;

#[async_trait]
impl PeerConnector for NullPeerConnector {
    async fn offer(
        &self,
        _signals: mpsc::UnboundedSender<OutboundSignal>,
        _inbound: mpsc::Sender<String>,
    ) -> Result<Arc<dyn PeerChannel>, PeerError> {
        Err(PeerError::Unsupported)
    }

    async fn answer(
        &self,
        _offer: Value,
        _signals: mpsc::UnboundedSender<OutboundSignal>,
        _inbound: mpsc::Sender<String>,
    ) -> Result<Arc<dyn PeerChannel>, PeerError> {
        Err(PeerError::Unsupported)
    }
}

/// The connector this build supports.
///
/// With the `webrtc` feature and `enabled`, a WebRTC connector using
/// `ice_servers`; otherwise [`NullPeerConnector`].
#[cfg(feature = "webrtc")]
pub fn default_connector(enabled: bool, ice_servers: &[String]) -> Arc<dyn PeerConnector> {
    if enabled {
        Arc::new(rtc::WebRtcPeerConnector::new(ice_servers.to_vec()))
    } else {
        Arc::new(NullPeerConnector)
    }
}

/// The connector this build supports: always [`NullPeerConnector`] without
/// the `webrtc` feature.
#[cfg(not(feature = "webrtc"))]
pub fn default_connector(_enabled: bool, _ice_servers: &[String]) -> Arc<dyn PeerConnector> {
    Arc::new(NullPeerConnector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_connector_reports_unsupported() {
        // Arrange
        let connector = NullPeerConnector;
        let (signals, _signals_rx) = mpsc::unbounded_channel();
        let (inbound, _inbound_rx) = mpsc::channel(1);

        // Act
        let offered = connector.offer(signals.clone(), inbound.clone()).await;
        let answered = connector.answer(Value::Null, signals, inbound).await;

        // Assert
        assert!(matches!(offered, Err(PeerError::Unsupported)));
        assert!(matches!(answered, Err(PeerError::Unsupported)));
    }

    #[cfg(not(feature = "webrtc"))]
    #[tokio::test]
    async fn test_default_connector_without_feature_is_relay_only() {
        let connector = default_connector(true, &[]);
        let (signals, _rx) = mpsc::unbounded_channel();
        let (inbound, _in_rx) = mpsc::channel(1);
        assert!(connector.offer(signals, inbound).await.is_err());
    }

    #[test]
    fn test_outbound_signal_maps_to_matching_relay_message() {
        // Arrange
        let signal = OutboundSignal {
            kind: SignalKind::IceCandidate,
            payload: serde_json::json!({"candidate": "c1"}),
        };

        // Act
        let msg = signal.into_relay_message("s-1", "device-1");

        // Assert
        match msg {
            RelayMessage::WebrtcIceCandidate(p) => {
                assert_eq!(p.session_id, "s-1");
                assert_eq!(p.device_id, "device-1");
                assert_eq!(p.payload["candidate"], "c1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
