//! WebRTC data-channel implementation of the peer channel.
//!
//! Negotiation payloads are the `webrtc` crate's own JSON forms: an
//! `RTCSessionDescription` (`{"type":"offer","sdp":"..."}`) for offer and
//! answer, and an `RTCIceCandidateInit` for each trickled candidate.

use std::sync::Arc;

use ::webrtc::api::interceptor_registry::register_default_interceptors;
use ::webrtc::api::media_engine::MediaEngine;
use ::webrtc::api::APIBuilder;
use ::webrtc::data_channel::data_channel_message::DataChannelMessage;
use ::webrtc::data_channel::data_channel_state::RTCDataChannelState;
use ::webrtc::data_channel::RTCDataChannel;
use ::webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use ::webrtc::ice_transport::ice_server::RTCIceServer;
use ::webrtc::interceptor::registry::Registry;
use ::webrtc::peer_connection::configuration::RTCConfiguration;
use ::webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use ::webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use ::webrtc::peer_connection::RTCPeerConnection;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{OutboundSignal, PeerChannel, PeerConnector, PeerError, PeerState, SignalKind};

const CHANNEL_LABEL: &str = "remote-input";

fn negotiation<E: std::fmt::Display>(e: E) -> PeerError {
    PeerError::Negotiation(e.to_string())
}

fn invalid<E: std::fmt::Display>(e: E) -> PeerError {
    PeerError::InvalidPayload(e.to_string())
}

// ── Connector ─────────────────────────────────────────────────────────────────

/// Creates WebRTC peer connections with a single ordered data channel.
#[derive(Debug, Clone)]
pub struct WebRtcPeerConnector {
    ice_servers: Vec<String>,
}

impl WebRtcPeerConnector {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self { ice_servers }
    }

    async fn new_connection(&self) -> Result<Arc<RTCPeerConnection>, PeerError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs().map_err(negotiation)?;
        let registry = register_default_interceptors(Registry::new(), &mut media).map_err(negotiation)?;
        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if self.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };
        let config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };
        let pc = api.new_peer_connection(config).await.map_err(negotiation)?;
        Ok(Arc::new(pc))
    }
}

#[async_trait]
impl PeerConnector for WebRtcPeerConnector {
    async fn offer(
        &self,
        signals: mpsc::UnboundedSender<OutboundSignal>,
        inbound: mpsc::Sender<String>,
    ) -> Result<Arc<dyn PeerChannel>, PeerError> {
        let pc = self.new_connection().await?;
        let channel = WebRtcChannel::new(Arc::clone(&pc), signals.clone());

        let dc = pc
            .create_data_channel(CHANNEL_LABEL, None)
            .await
            .map_err(negotiation)?;
        wire_data_channel(&dc, Arc::clone(&channel.state), inbound);
        *channel.data.lock() = Some(dc);

        let offer = pc.create_offer(None).await.map_err(negotiation)?;
        pc.set_local_description(offer.clone())
            .await
            .map_err(negotiation)?;
        let payload = serde_json::to_value(&offer).map_err(invalid)?;
        let _ = signals.send(OutboundSignal {
            kind: SignalKind::Offer,
            payload,
        });

        debug!("peer offer created");
        Ok(Arc::new(channel))
    }

    async fn answer(
        &self,
        offer: Value,
        signals: mpsc::UnboundedSender<OutboundSignal>,
        inbound: mpsc::Sender<String>,
    ) -> Result<Arc<dyn PeerChannel>, PeerError> {
        let offer: RTCSessionDescription = serde_json::from_value(offer).map_err(invalid)?;
        let pc = self.new_connection().await?;
        let channel = WebRtcChannel::new(Arc::clone(&pc), signals.clone());

        let slot = Arc::clone(&channel.data);
        let state = Arc::clone(&channel.state);
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            wire_data_channel(&dc, Arc::clone(&state), inbound.clone());
            if dc.ready_state() == RTCDataChannelState::Open {
                *state.lock() = PeerState::Open;
            }
            *slot.lock() = Some(dc);
            Box::pin(async {})
        }));

        pc.set_remote_description(offer).await.map_err(negotiation)?;
        let answer = pc.create_answer(None).await.map_err(negotiation)?;
        pc.set_local_description(answer.clone())
            .await
            .map_err(negotiation)?;
        let payload = serde_json::to_value(&answer).map_err(invalid)?;
        let _ = signals.send(OutboundSignal {
            kind: SignalKind::Answer,
            payload,
        });

        debug!("peer answer created");
        Ok(Arc::new(channel))
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

struct WebRtcChannel {
    pc: Arc<RTCPeerConnection>,
    data: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    state: Arc<Mutex<PeerState>>,
}

impl WebRtcChannel {
    fn new(pc: Arc<RTCPeerConnection>, signals: mpsc::UnboundedSender<OutboundSignal>) -> Self {
        let state = Arc::new(Mutex::new(PeerState::Negotiating));

        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signals = signals.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                match candidate.to_json().map(|init| serde_json::to_value(init)) {
                    Ok(Ok(payload)) => {
                        let _ = signals.send(OutboundSignal {
                            kind: SignalKind::IceCandidate,
                            payload,
                        });
                    }
                    Ok(Err(e)) => debug!("unencodable ICE candidate: {e}"),
                    Err(e) => debug!("unusable ICE candidate: {e}"),
                }
            })
        }));

        let conn_state = Arc::clone(&state);
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            debug!(state = %s, "peer connection state");
            if matches!(
                s,
                RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Closed
                    | RTCPeerConnectionState::Disconnected
            ) {
                *conn_state.lock() = PeerState::Closed;
            }
            Box::pin(async {})
        }));

        Self {
            pc,
            data: Arc::new(Mutex::new(None)),
            state,
        }
    }
}

fn wire_data_channel(
    dc: &Arc<RTCDataChannel>,
    state: Arc<Mutex<PeerState>>,
    inbound: mpsc::Sender<String>,
) {
    let open_state = Arc::clone(&state);
    dc.on_open(Box::new(move || {
        let mut current = open_state.lock();
        if *current == PeerState::Negotiating {
            info!("peer channel open");
            *current = PeerState::Open;
        }
        Box::pin(async {})
    }));

    dc.on_close(Box::new(move || {
        *state.lock() = PeerState::Closed;
        Box::pin(async {})
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let inbound = inbound.clone();
        Box::pin(async move {
            if !msg.is_string {
                return;
            }
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => {
                    let _ = inbound.send(text).await;
                }
                Err(e) => debug!("dropping non-UTF-8 peer message: {e}"),
            }
        })
    }));
}

#[async_trait]
impl PeerChannel for WebRtcChannel {
    fn state(&self) -> PeerState {
        *self.state.lock()
    }

    async fn send_text(&self, text: String) -> Result<(), PeerError> {
        if self.state() != PeerState::Open {
            return Err(PeerError::NotOpen);
        }
        let Some(dc) = self.data.lock().clone() else {
            return Err(PeerError::NotOpen);
        };
        dc.send_text(text)
            .await
            .map(|_| ())
            .map_err(|e| PeerError::Send(e.to_string()))
    }

    async fn apply_answer(&self, answer: Value) -> Result<(), PeerError> {
        let answer: RTCSessionDescription = serde_json::from_value(answer).map_err(invalid)?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(negotiation)
    }

    async fn add_remote_candidate(&self, candidate: Value) -> Result<(), PeerError> {
        let candidate: RTCIceCandidateInit = serde_json::from_value(candidate).map_err(invalid)?;
        self.pc
            .add_ice_candidate(candidate)
            .await
            .map_err(negotiation)
    }

    async fn close(&self) {
        *self.state.lock() = PeerState::Closed;
        let dc = self.data.lock().take();
        if let Some(dc) = dc {
            let _ = dc.close().await;
        }
        if let Err(e) = self.pc.close().await {
            debug!("peer close: {e}");
        }
    }
}
