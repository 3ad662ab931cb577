//! Viewer Session Controller.
//!
//! One `ViewerSession` drives one remote-control session from the operator's
//! side.  It owns no socket: the relay link is injected as a
//! [`MessageSink`] plus the link's event receiver, so the same controller
//! runs against the real [`remote_link::TransportLink`] or a recording sink
//! in tests.
//!
//! # State machine
//!
//! ```text
//!  Disconnected ──open()──▶ Connecting ──link up──▶ ConnectedUnregistered
//!                               │                          │ send register_desktop_session
//!                         timeout / link gone               ▼
//!                               ▼                     WaitingFrames ──first frame──▶ Active
//!                         Disconnected (error)               │                        │
//!                                                            └────────close()─────────┴──▶ Closed
//! ```
//!
//! # Command transport
//!
//! Input commands go over the peer channel while it is Open and over the
//! relay otherwise.  A failed peer send is retried once over the relay.
//! Frames always arrive over the relay.
//!
//! Once a peer channel exists, every outbound command (and the final stop
//! notice) passes through one queue drained by a single task, so a command
//! that falls back to the relay can never overtake an earlier one.  Remote
//! answers and ICE candidates are applied the same way, one at a time in
//! arrival order.
//!
//! # Threading
//!
//! Built for a current-thread runtime.  Everything except [`ViewerSession::open`]
//! is a synchronous state transition; peer-channel I/O is spawned onto the
//! runtime.  Duplicate and late events (frames for another session, anything
//! after close) are ignored.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use remote_core::protocol::messages::{DesktopFrame, RegisterDesktopSession, StopDesktopSession};
use remote_core::protocol::unix_millis;
use remote_core::{encode_message, AutoFit, CanvasGeometry, InputCommand, RelayMessage};
use remote_link::peer::{OutboundSignal, PeerChannel, PeerConnector, PeerError, PeerState};
use remote_link::{LinkEvent, MessageSink, TransportError};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::input_mapper::{InputMapper, Mapped};
use super::render::{FramePresentation, FrameRenderer};
use crate::domain::{LocalInput, ViewerConfig};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Disconnected,
    Connecting,
    ConnectedUnregistered,
    WaitingFrames,
    Active,
    Closed,
}

/// Failures the operator is told about.  Per-command failures never surface
/// here.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("relay connection not established within {0:?}")]
    ConnectTimeout(Duration),

    #[error("relay link shut down before the session started")]
    LinkClosed,

    #[error("session registration could not be sent: {0}")]
    Register(#[source] TransportError),

    #[error("session was already opened")]
    AlreadyOpened,
}

/// Which path a forwarded command took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    Peer,
    Relay,
}

/// What became of one local input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Forwarded(CommandRoute),
    Throttled,
    /// Not forwarded: no active session, unmapped key, empty text.
    Ignored,
    /// The operator pressed the local cancel key.
    CancelRequested,
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Outbound traffic queued behind the peer channel.
enum Outbound {
    /// Peer channel when Open, relay otherwise.
    Command(RelayMessage),
    /// Relay only.
    Relay(RelayMessage),
}

impl Outbound {
    fn into_message(self) -> RelayMessage {
        match self {
            Outbound::Command(msg) | Outbound::Relay(msg) => msg,
        }
    }
}

/// Negotiation message received from the agent.
enum RemoteSignal {
    Answer(Value),
    Candidate(Value),
}

struct ViewerPeer {
    channel: Arc<dyn PeerChannel>,
    outbound: mpsc::UnboundedSender<Outbound>,
    remote_signals: mpsc::UnboundedSender<RemoteSignal>,
    command_pump: JoinHandle<()>,
    signal_applier: JoinHandle<()>,
    signal_forwarder: JoinHandle<()>,
    open_watchdog: JoinHandle<()>,
    /// Held so the connector's inbound sender stays valid; the agent sends
    /// nothing back on the channel.
    _inbound: mpsc::Receiver<String>,
}

pub struct ViewerSession {
    session_id: String,
    device_id: String,
    viewport: (f64, f64),
    connect_timeout: Duration,
    negotiation_timeout: Duration,
    peer_enabled: bool,

    sink: Arc<dyn MessageSink>,
    peer_connector: Arc<dyn PeerConnector>,
    renderer: Box<dyn FrameRenderer>,

    state: ViewerState,
    canvas: Option<CanvasGeometry>,
    auto_fit: AutoFit,
    mapper: InputMapper,
    peer: Option<ViewerPeer>,
    frames_received: u64,
}

impl ViewerSession {
    pub fn new(
        config: &ViewerConfig,
        sink: Arc<dyn MessageSink>,
        peer_connector: Arc<dyn PeerConnector>,
        renderer: Box<dyn FrameRenderer>,
    ) -> Self {
        Self {
            session_id: config.session_id.clone(),
            device_id: config.device_id.clone(),
            viewport: (config.viewport_width, config.viewport_height),
            connect_timeout: config.connect_timeout,
            negotiation_timeout: config.negotiation_timeout,
            peer_enabled: config.peer_enabled,
            sink,
            peer_connector,
            renderer,
            state: ViewerState::Disconnected,
            canvas: None,
            auto_fit: AutoFit::new(),
            mapper: InputMapper::new(config.move_throttle),
            peer: None,
            frames_received: 0,
        }
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn canvas(&self) -> Option<&CanvasGeometry> {
        self.canvas.as_ref()
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// `None` when the session is relay-only.
    pub fn peer_state(&self) -> Option<PeerState> {
        self.peer.as_ref().map(|p| p.channel.state())
    }

    /// Connects, registers and starts peer negotiation.
    ///
    /// Waits on `link_events` for the relay connection unless the sink is
    /// already connected.  Events other than `Connected` seen while waiting
    /// are discarded.  Peer negotiation failures are logged and leave the
    /// session relay-only; they never fail `open`.
    ///
    /// # Errors
    ///
    /// - [`ViewerError::ConnectTimeout`] / [`ViewerError::LinkClosed`]: the
    ///   link never came up.  State returns to Disconnected.
    /// - [`ViewerError::Register`]: the registration was not queued.
    /// - [`ViewerError::AlreadyOpened`]: `open` was called before.
    pub async fn open(
        &mut self,
        link_events: &mut mpsc::Receiver<LinkEvent>,
    ) -> Result<(), ViewerError> {
        if self.state != ViewerState::Disconnected {
            return Err(ViewerError::AlreadyOpened);
        }

        // Step 1: relay connection.
        self.state = ViewerState::Connecting;
        if !self.sink.is_connected() {
            let wait = async {
                loop {
                    match link_events.recv().await {
                        Some(LinkEvent::Connected) => return Ok(()),
                        Some(other) => trace!(?other, "event before connect discarded"),
                        None => return Err(ViewerError::LinkClosed),
                    }
                }
            };
            let result = match tokio::time::timeout(self.connect_timeout, wait).await {
                Ok(result) => result,
                Err(_) => Err(ViewerError::ConnectTimeout(self.connect_timeout)),
            };
            if let Err(e) = result {
                self.state = ViewerState::Disconnected;
                return Err(e);
            }
        }
        self.state = ViewerState::ConnectedUnregistered;

        // Step 2: registration.
        let register = RelayMessage::RegisterDesktopSession(RegisterDesktopSession {
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
        });
        if let Err(e) = self.sink.send(&register) {
            self.state = ViewerState::Disconnected;
            return Err(ViewerError::Register(e));
        }
        self.auto_fit.reset();
        self.mapper.reset();
        self.state = ViewerState::WaitingFrames;
        info!(session_id = %self.session_id, device_id = %self.device_id, "session registered");

        // Step 3: optional peer channel.
        if self.peer_enabled {
            self.start_peer().await;
        }
        Ok(())
    }

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => {
                if self.is_registered() {
                    info!(session_id = %self.session_id, "relay link restored");
                }
            }
            LinkEvent::Disconnected => {
                if self.is_registered() {
                    warn!(session_id = %self.session_id, "relay link lost; waiting for reconnect");
                }
            }
            LinkEvent::Message(msg) => self.handle_message(msg),
        }
    }

    pub fn handle_message(&mut self, msg: RelayMessage) {
        if !self.is_registered() {
            trace!(kind = msg.type_name(), "message outside a session ignored");
            return;
        }
        match msg {
            RelayMessage::DesktopFrame(frame) => {
                if frame.session_id == self.session_id {
                    self.on_frame(&frame);
                } else {
                    trace!(session_id = %frame.session_id, "frame for another session ignored");
                }
            }
            RelayMessage::WebrtcAnswer(signal) => {
                self.on_peer_signal(&signal.session_id, RemoteSignal::Answer(signal.payload));
            }
            RelayMessage::WebrtcIceCandidate(signal) => {
                self.on_peer_signal(&signal.session_id, RemoteSignal::Candidate(signal.payload));
            }
            other => trace!(kind = other.type_name(), "message ignored by viewer"),
        }
    }

    /// Maps and forwards one local input event.
    ///
    /// Input is only forwarded once the session is Active, since pointer
    /// mapping needs the canvas the first frame establishes.
    pub fn handle_local_input(&mut self, input: &LocalInput, now: Instant) -> InputOutcome {
        let Some(canvas) = self.canvas.filter(|_| self.state == ViewerState::Active) else {
            return InputOutcome::Ignored;
        };
        match self.mapper.map(input, &canvas, now) {
            Mapped::Command(cmd) => InputOutcome::Forwarded(self.send_command(&cmd)),
            Mapped::Throttled => InputOutcome::Throttled,
            Mapped::Cancel => InputOutcome::CancelRequested,
            Mapped::Ignored => InputOutcome::Ignored,
        }
    }

    /// Operator-invoked fit.  Recomputes the scale now and turns automatic
    /// fitting off for the rest of the session.  Returns the new scale, or
    /// `None` before the first frame.
    pub fn fit_to_viewport(&mut self) -> Option<f64> {
        let canvas = self.canvas?;
        let (vw, vh) = self.viewport;
        let scale = self
            .auto_fit
            .fit_now(vw, vh, canvas.rendered_width, canvas.rendered_height);
        self.canvas = Some(self.layout(
            canvas.rendered_width,
            canvas.rendered_height,
            canvas.remote_width,
            canvas.remote_height,
            scale,
        ));
        debug!(scale, "canvas fitted to viewport");
        Some(scale)
    }

    /// The local drawing area changed size.  The scale is kept; the canvas
    /// is re-centred.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
        if let Some(c) = self.canvas {
            self.canvas = Some(self.layout(
                c.rendered_width,
                c.rendered_height,
                c.remote_width,
                c.remote_height,
                c.scale,
            ));
        }
    }

    /// Ends the session: best-effort stop notice, then releases the peer
    /// channel.  Idempotent.  The relay link itself belongs to the caller.
    pub fn close(&mut self) {
        if self.state == ViewerState::Closed {
            return;
        }
        if self.is_registered() {
            let stop = RelayMessage::StopDesktopSession(StopDesktopSession {
                session_id: self.session_id.clone(),
                device_id: self.device_id.clone(),
            });
            self.enqueue(Outbound::Relay(stop));
        }
        self.release_peer();
        self.canvas = None;
        self.state = ViewerState::Closed;
        info!(
            session_id = %self.session_id,
            frames = self.frames_received,
            "session closed"
        );
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn is_registered(&self) -> bool {
        matches!(self.state, ViewerState::WaitingFrames | ViewerState::Active)
    }

    fn on_frame(&mut self, frame: &DesktopFrame) {
        let Some((width, height)) = frame_size(frame) else {
            debug!("frame with unreadable size dropped");
            return;
        };
        let remote_width = frame.screen_width.filter(|w| *w > 0).unwrap_or(width);
        let remote_height = frame.screen_height.filter(|h| *h > 0).unwrap_or(height);

        let (vw, vh) = self.viewport;
        let scale = match self.auto_fit.on_frame(vw, vh, width, height) {
            Some(fitted) => {
                debug!(scale = fitted, "canvas auto-fitted");
                fitted
            }
            None => self.canvas.map_or(1.0, |c| c.scale),
        };
        let canvas = self.layout(width, height, remote_width, remote_height, scale);
        self.canvas = Some(canvas);
        self.frames_received += 1;

        if self.state == ViewerState::WaitingFrames {
            self.state = ViewerState::Active;
            info!(
                session_id = %self.session_id,
                width,
                height,
                remote_width,
                remote_height,
                "first frame received"
            );
        }

        let presentation = FramePresentation {
            session_id: &self.session_id,
            image: &frame.frame,
            canvas: &canvas,
            sequence: self.frames_received,
        };
        if let Err(e) = self.renderer.present(&presentation) {
            debug!("frame not rendered: {e}");
        }
    }

    /// Canvas of the given sizes drawn at `scale`, centred in the viewport
    /// when it fits.
    fn layout(
        &self,
        rendered_width: u32,
        rendered_height: u32,
        remote_width: u32,
        remote_height: u32,
        scale: f64,
    ) -> CanvasGeometry {
        let (vw, vh) = self.viewport;
        let origin_x = ((vw - rendered_width as f64 * scale) / 2.0).max(0.0);
        let origin_y = ((vh - rendered_height as f64 * scale) / 2.0).max(0.0);
        CanvasGeometry {
            origin_x,
            origin_y,
            scale,
            rendered_width,
            rendered_height,
            remote_width,
            remote_height,
        }
    }

    fn send_command(&self, cmd: &InputCommand) -> CommandRoute {
        let msg = RelayMessage::UemRemoteAction(cmd.to_action_message(&self.device_id, unix_millis()));
        let route = match self.peer.as_ref() {
            Some(peer) if peer.channel.state() == PeerState::Open => CommandRoute::Peer,
            _ => CommandRoute::Relay,
        };
        self.enqueue(Outbound::Command(msg));
        route
    }

    /// Sends through the peer queue when a peer channel exists, straight to
    /// the relay otherwise.
    fn enqueue(&self, item: Outbound) {
        let item = match self.peer.as_ref() {
            Some(peer) => match peer.outbound.send(item) {
                Ok(()) => return,
                Err(mpsc::error::SendError(item)) => {
                    debug!("command queue stopped; using relay");
                    item
                }
            },
            None => item,
        };
        send_over_relay(self.sink.as_ref(), &item.into_message());
    }

    async fn start_peer(&mut self) {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(16);
        let signal_forwarder = tokio::spawn(forward_signals(
            signals_rx,
            Arc::clone(&self.sink),
            self.session_id.clone(),
            self.device_id.clone(),
        ));

        let offered = tokio::time::timeout(
            self.negotiation_timeout,
            self.peer_connector.offer(signals_tx, inbound_tx),
        )
        .await;

        match offered {
            Ok(Ok(channel)) => {
                let open_watchdog = tokio::spawn(close_unless_open(
                    Arc::clone(&channel),
                    self.negotiation_timeout,
                ));
                let (outbound, outbound_rx) = mpsc::unbounded_channel();
                let command_pump = tokio::spawn(pump_commands(
                    outbound_rx,
                    Arc::clone(&channel),
                    Arc::clone(&self.sink),
                ));
                let (remote_signals, remote_signals_rx) = mpsc::unbounded_channel();
                let signal_applier =
                    tokio::spawn(apply_remote_signals(remote_signals_rx, Arc::clone(&channel)));
                info!(session_id = %self.session_id, "peer channel negotiating");
                self.peer = Some(ViewerPeer {
                    channel,
                    outbound,
                    remote_signals,
                    command_pump,
                    signal_applier,
                    signal_forwarder,
                    open_watchdog,
                    _inbound: inbound_rx,
                });
            }
            Ok(Err(PeerError::Unsupported)) => {
                signal_forwarder.abort();
                debug!("peer channel unsupported; relay only");
            }
            Ok(Err(e)) => {
                signal_forwarder.abort();
                info!("peer negotiation failed, relay only: {e}");
            }
            Err(_) => {
                signal_forwarder.abort();
                info!("peer offer timed out, relay only");
            }
        }
    }

    fn on_peer_signal(&self, session_id: &str, signal: RemoteSignal) {
        if session_id != self.session_id {
            trace!("peer signal for another session ignored");
            return;
        }
        let Some(peer) = self.peer.as_ref() else {
            trace!("peer signal without a peer channel ignored");
            return;
        };
        if peer.remote_signals.send(signal).is_err() {
            debug!("peer signal dropped: applier stopped");
        }
    }

    /// Stops negotiation.  The command queue is dropped, not aborted: the
    /// pump sends what is left, then closes the channel.
    fn release_peer(&mut self) {
        if let Some(peer) = self.peer.take() {
            peer.signal_forwarder.abort();
            peer.signal_applier.abort();
            peer.open_watchdog.abort();
        }
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        if let Some(peer) = self.peer.take() {
            peer.command_pump.abort();
            peer.signal_applier.abort();
            peer.signal_forwarder.abort();
            peer.open_watchdog.abort();
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Frame dimensions from the message, or from the image header when the
/// agent did not send them.
fn frame_size(frame: &DesktopFrame) -> Option<(u32, u32)> {
    frame
        .width
        .zip(frame.height)
        .or_else(|| {
            image::io::Reader::new(Cursor::new(&frame.frame))
                .with_guessed_format()
                .ok()?
                .into_dimensions()
                .ok()
        })
        .filter(|(w, h)| *w > 0 && *h > 0)
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

fn send_over_relay(sink: &dyn MessageSink, msg: &RelayMessage) {
    if let Err(e) = sink.send(msg) {
        debug!(kind = msg.type_name(), "not sent: {e}");
    }
}

/// Delivers queued commands in order.  Closes the channel once the queue's
/// sender is gone and the backlog is sent.
async fn pump_commands(
    mut queue: mpsc::UnboundedReceiver<Outbound>,
    channel: Arc<dyn PeerChannel>,
    sink: Arc<dyn MessageSink>,
) {
    while let Some(item) = queue.recv().await {
        let msg = match item {
            Outbound::Command(msg) if channel.state() == PeerState::Open => {
                match encode_message(&msg) {
                    Ok(text) => match channel.send_text(text).await {
                        Ok(()) => continue,
                        Err(e) => debug!("peer send failed, using relay: {e}"),
                    },
                    Err(e) => debug!("command not encodable for peer channel: {e}"),
                }
                msg
            }
            other => other.into_message(),
        };
        send_over_relay(sink.as_ref(), &msg);
    }
    channel.close().await;
}

/// Applies answers and candidates one at a time; a candidate is only
/// accepted after the answer before it has been applied.
async fn apply_remote_signals(
    mut signals: mpsc::UnboundedReceiver<RemoteSignal>,
    channel: Arc<dyn PeerChannel>,
) {
    while let Some(signal) = signals.recv().await {
        let result = match signal {
            RemoteSignal::Answer(answer) => channel.apply_answer(answer).await,
            RemoteSignal::Candidate(candidate) => channel.add_remote_candidate(candidate).await,
        };
        if let Err(e) = result {
            debug!("peer signal rejected: {e}");
        }
    }
}

async fn close_unless_open(channel: Arc<dyn PeerChannel>, deadline: Duration) {
    tokio::time::sleep(deadline).await;
    if channel.state() != PeerState::Open {
        info!("peer channel did not open in time; relay only");
        channel.close().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
