//! Routes relay messages and link events to the agent's components.
//!
//! | Inbound message            | Handling                                             |
//! |----------------------------|------------------------------------------------------|
//! | `register_desktop_session` | start a session if addressed to this device          |
//! | `uem_remote_action`        | validate, then inject (rejected without session)     |
//! | `webrtc_offer`             | answer through the peer connector                    |
//! | `webrtc_ice_candidate`     | add to the peer channel                              |
//! | `stop_desktop_session`     | stop the matching session, close the peer channel    |
//! | anything else              | ignored                                              |
//!
//! Messages addressed to another device id are dropped.  Registrations,
//! actions and signalling for the active session count as viewer activity,
//! which keeps the session from being taken over as stale.
//!
//! Input commands may also arrive over the peer channel as the same JSON
//! text; [`AgentDispatcher::handle_peer_text`] feeds them through the same
//! path.  Every failure is logged and dropped.

use std::sync::Arc;

use remote_core::protocol::messages::{PeerSignal, RemoteActionMessage};
use remote_core::{decode_message, InputCommand, RelayMessage};
use remote_link::peer::{OutboundSignal, PeerChannel, PeerConnector};
use remote_link::{LinkEvent, MessageSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::inject_input::{InjectionError, InputInjector};
use super::session_coordinator::SessionCoordinator;

/// The agent's side of one peer channel.
struct PeerLink {
    session_id: String,
    channel: Arc<dyn PeerChannel>,
    signal_forwarder: JoinHandle<()>,
}

pub struct AgentDispatcher {
    device_id: String,
    coordinator: Arc<SessionCoordinator>,
    injector: InputInjector,
    sink: Arc<dyn MessageSink>,
    peer_connector: Arc<dyn PeerConnector>,
    peer_inbound: mpsc::Sender<String>,
    peer: Option<PeerLink>,
}

impl AgentDispatcher {
    /// `peer_inbound` receives text arriving on any peer channel; the owner
    /// passes it back to [`Self::handle_peer_text`].
    pub fn new(
        device_id: impl Into<String>,
        coordinator: Arc<SessionCoordinator>,
        injector: InputInjector,
        sink: Arc<dyn MessageSink>,
        peer_connector: Arc<dyn PeerConnector>,
        peer_inbound: mpsc::Sender<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            coordinator,
            injector,
            sink,
            peer_connector,
            peer_inbound,
            peer: None,
        }
    }

    pub fn has_peer_channel(&self) -> bool {
        self.peer.is_some()
    }

    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => info!("relay link up"),
            LinkEvent::Disconnected => {
                info!("relay link down; session kept until reconnect");
            }
            LinkEvent::Message(msg) => self.handle_message(msg).await,
        }
    }

    pub async fn handle_message(&mut self, msg: RelayMessage) {
        match msg {
            RelayMessage::RegisterDesktopSession(reg) => {
                if reg.device_id != self.device_id {
                    debug!(device_id = %reg.device_id, "registration for another device ignored");
                    return;
                }
                if self.is_active_session(&reg.session_id) {
                    self.coordinator.record_activity();
                    debug!(session_id = %reg.session_id, "repeated registration for the active session");
                    return;
                }
                let started = self
                    .coordinator
                    .start_session(&reg.session_id, &reg.device_id)
                    .await;
                // A replaced session's peer channel must not keep injecting.
                if started && self.peer.as_ref().is_some_and(|p| p.session_id != reg.session_id) {
                    self.close_peer().await;
                }
            }
            RelayMessage::UemRemoteAction(action) => self.handle_action(&action),
            RelayMessage::WebrtcOffer(signal) => self.answer_offer(signal).await,
            RelayMessage::WebrtcIceCandidate(signal) => self.add_candidate(signal).await,
            RelayMessage::StopDesktopSession(stop) => {
                if stop.device_id != self.device_id {
                    debug!(device_id = %stop.device_id, "stop for another device ignored");
                    return;
                }
                if self.coordinator.stop_session_matching(&stop.session_id).await {
                    self.close_peer().await;
                }
            }
            RelayMessage::WebrtcAnswer(_) => debug!("unexpected webrtc_answer ignored"),
            RelayMessage::DesktopFrame(_) => trace!("desktop_frame ignored on agent"),
        }
    }

    /// Handles one text message from the peer channel.
    pub fn handle_peer_text(&mut self, text: &str) {
        match decode_message(text) {
            Ok(RelayMessage::UemRemoteAction(action)) => self.handle_action(&action),
            Ok(other) => debug!(kind = other.type_name(), "non-input message on peer channel ignored"),
            Err(e) => debug!("malformed peer message dropped: {e}"),
        }
    }

    /// Stops any session and releases the peer channel.
    pub async fn shutdown(&mut self) {
        self.coordinator.stop_session().await;
        self.close_peer().await;
    }

    fn handle_action(&mut self, action: &RemoteActionMessage) {
        if action.device_id != self.device_id {
            debug!(device_id = %action.device_id, "action for another device ignored");
            return;
        }
        let command = match InputCommand::try_from(action) {
            Ok(c) => c,
            Err(e) => {
                debug!("invalid remote action dropped: {e}");
                return;
            }
        };
        if self.coordinator.active_session().is_some() {
            self.coordinator.record_activity();
        }
        match self.injector.handle(&command) {
            Ok(()) => {}
            Err(InjectionError::NoActiveSession) => {
                debug!(action = ?command.action(), "input rejected: no active session");
            }
            Err(e) => match e.remediation_hint() {
                Some(hint) => warn!(action = ?command.action(), hint, "input injection failed: {e}"),
                None => warn!(action = ?command.action(), "input injection failed: {e}"),
            },
        }
    }

    async fn answer_offer(&mut self, signal: PeerSignal) {
        if !self.is_active_session(&signal.session_id) {
            debug!(session_id = %signal.session_id, "offer for inactive session ignored");
            return;
        }
        self.coordinator.record_activity();
        self.close_peer().await;

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let signal_forwarder = tokio::spawn(forward_signals(
            signals_rx,
            Arc::clone(&self.sink),
            signal.session_id.clone(),
            self.device_id.clone(),
        ));

        match self
            .peer_connector
            .answer(signal.payload, signals_tx, self.peer_inbound.clone())
            .await
        {
            Ok(channel) => {
                info!(session_id = %signal.session_id, "peer channel negotiating");
                self.peer = Some(PeerLink {
                    session_id: signal.session_id,
                    channel,
                    signal_forwarder,
                });
            }
            Err(e) => {
                signal_forwarder.abort();
                info!(session_id = %signal.session_id, "peer channel unavailable, relay only: {e}");
            }
        }
    }

    async fn add_candidate(&mut self, signal: PeerSignal) {
        let Some(peer) = self.peer.as_ref().filter(|p| p.session_id == signal.session_id) else {
            trace!("ICE candidate without a matching peer channel ignored");
            return;
        };
        self.coordinator.record_activity();
        if let Err(e) = peer.channel.add_remote_candidate(signal.payload).await {
            debug!("ICE candidate rejected: {e}");
        }
    }

    fn is_active_session(&self, session_id: &str) -> bool {
        self.coordinator
            .active_session()
            .is_some_and(|s| s.session_id == session_id)
    }

    async fn close_peer(&mut self) {
        if let Some(peer) = self.peer.take() {
            peer.signal_forwarder.abort();
            peer.channel.close().await;
            debug!(session_id = %peer.session_id, "peer channel closed");
        }
    }
}

async fn forward_signals(
    mut signals: mpsc::UnboundedReceiver<OutboundSignal>,
    sink: Arc<dyn MessageSink>,
    session_id: String,
    device_id: String,
) {
    while let Some(signal) = signals.recv().await {
        let msg = signal.into_relay_message(&session_id, &device_id);
        if let Err(e) = sink.send(&msg) {
            debug!("peer signal not sent: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
