//! The process-wide persistent link to the relay.
//!
//! # Lifecycle
//!
//! ```text
//!            ┌──────── connect ok ────────┐
//!            │                            ▼
//! Disconnected ──▶ Connecting ──▶ Connected ──(close | send failure | silence)──▶ Disconnected
//!      ▲              │
//!      └─ connect err ┘   (retry after base × 2^min(n-1, 4), capped)
//! ```
//!
//! One driver task owns the retry policy.  Everything that can notice a dead
//! connection (the receive loop, the heartbeat loop, a failing `send`) calls
//! the same teardown routine.  Teardown is keyed by a connection generation:
//! only the first caller for the current generation changes state and asks
//! the driver for a reconnect, so a drop noticed by several loops at once
//! still yields exactly one reconnect.
//!
//! # Concurrency
//!
//! - The connect gate is a `tokio::sync::Mutex<()>` taken with `try_lock`, so
//!   at most one handshake is in flight and extra callers return immediately.
//! - Link state lives behind a `parking_lot::Mutex`; critical sections are
//!   short and never await.
//! - Reconnect triggers collapse through a `Notify` permit.
//! - Shutdown is a `watch` channel observed by every loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use remote_core::{decode_message, encode_message, RelayMessage, ReconnectBackoff};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::connector::{RelayConnection, RelayConnector, WireFrame};
use crate::error::TransportError;

// ── Public types ──────────────────────────────────────────────────────────────

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events delivered to the link's owner.
///
/// The channel closes when the link is shut down.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Message(RelayMessage),
}

/// Result of one [`TransportLink::connect`] call.
#[derive(Debug)]
pub enum ConnectOutcome {
    /// This call opened a new connection.
    Connected,
    /// A connection was already open; nothing happened.
    AlreadyConnected,
    /// Another connect attempt is in flight; nothing happened.
    InFlight,
    /// The link has been shut down.
    ShutDown,
    /// The attempt failed; the driver will retry after a backoff delay.
    Failed(TransportError),
}

/// Anything that can carry relay messages out of the process.
///
/// Implemented by [`TransportLink`]; collaborators depend on this trait so
/// they can be tested against a recording sink.
pub trait MessageSink: Send + Sync {
    /// Best-effort send.  Never blocks.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the message was not queued.
    fn send(&self, msg: &RelayMessage) -> Result<(), TransportError>;

    /// Returns `true` while a relay connection is open.
    fn is_connected(&self) -> bool;
}

// ── TransportLink ─────────────────────────────────────────────────────────────

struct LinkInner {
    state: LinkState,
    generation: u64,
    outbound: Option<mpsc::Sender<WireFrame>>,
    last_received: Option<Instant>,
    backoff: ReconnectBackoff,
    events: Option<mpsc::Sender<LinkEvent>>,
    connection_tasks: Vec<JoinHandle<()>>,
    last_network_change: Option<Instant>,
    started: bool,
}

/// Persistent, self-healing connection to the relay.
///
/// Construct once per process with [`TransportLink::new`], call
/// [`TransportLink::start`], and share the `Arc` with collaborators.
pub struct TransportLink {
    config: LinkConfig,
    connector: Arc<dyn RelayConnector>,
    inner: Mutex<LinkInner>,
    connect_gate: tokio::sync::Mutex<()>,
    reconnect_requested: Notify,
    connect_now: Notify,
    shutdown_tx: watch::Sender<bool>,
}

impl TransportLink {
    /// Creates a link in the Disconnected state.  Nothing runs until
    /// [`start`](Self::start) is called.
    pub fn new(config: LinkConfig, connector: Arc<dyn RelayConnector>) -> Arc<Self> {
        let backoff = ReconnectBackoff::new(config.backoff_base, config.backoff_cap);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            connector,
            inner: Mutex::new(LinkInner {
                state: LinkState::Disconnected,
                generation: 0,
                outbound: None,
                last_received: None,
                backoff,
                events: None,
                connection_tasks: Vec::new(),
                last_network_change: None,
                started: false,
            }),
            connect_gate: tokio::sync::Mutex::new(()),
            reconnect_requested: Notify::new(),
            connect_now: Notify::new(),
            shutdown_tx,
        })
    }

    /// Spawns the driver task and returns the event receiver.
    ///
    /// The driver connects immediately and keeps the link connected until
    /// [`shutdown`](Self::shutdown).  Calling `start` again replaces the
    /// event channel and spawns nothing new.
    pub fn start(self: &Arc<Self>) -> mpsc::Receiver<LinkEvent> {
        let (tx, rx) = mpsc::channel(self.config.event_capacity.max(1));
        let first_start = {
            let mut inner = self.inner.lock();
            inner.events = Some(tx);
            !std::mem::replace(&mut inner.started, true)
        };

        if first_start {
            let this = Arc::clone(self);
            let shutdown = self.shutdown_tx.subscribe();
            tokio::spawn(async move { this.drive(shutdown).await });
        }
        rx
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        self.inner.lock().state
    }

    /// Consecutive failed or pending reconnect attempts since the last
    /// successful connect.
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lock().backoff.attempt()
    }

    /// When the last frame of any kind arrived on the current connection.
    pub fn last_message_received_at(&self) -> Option<Instant> {
        self.inner.lock().last_received
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Opens a connection unless one is open or being opened.
    ///
    /// Serialized: concurrent callers get [`ConnectOutcome::InFlight`] while
    /// an attempt runs.  On failure a retry is scheduled with backoff.
    pub async fn connect(self: &Arc<Self>) -> ConnectOutcome {
        let outcome = self.attempt_connect().await;
        if matches!(outcome, ConnectOutcome::Failed(_)) {
            self.reconnect_requested.notify_one();
        }
        outcome
    }

    /// Best-effort send of one relay message.
    ///
    /// Never awaits.  When the connection is gone the link is torn down and
    /// a reconnect is scheduled; when the outbound queue is full the message
    /// is dropped.
    ///
    /// # Errors
    ///
    /// - [`TransportError::NotConnected`] if no connection is open.
    /// - [`TransportError::Saturated`] if the outbound queue is full.
    /// - [`TransportError::Closed`] if the connection died during the send.
    /// - [`TransportError::Protocol`] if the message cannot be encoded.
    pub fn send(&self, msg: &RelayMessage) -> Result<(), TransportError> {
        let text = encode_message(msg)?;
        let (generation, outbound) = {
            let inner = self.inner.lock();
            match (&inner.outbound, inner.state) {
                (Some(tx), LinkState::Connected) => (inner.generation, tx.clone()),
                _ => return Err(TransportError::NotConnected),
            }
        };

        match outbound.try_send(WireFrame::Text(text)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!(kind = msg.type_name(), "outbound queue full, dropping message");
                Err(TransportError::Saturated)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.teardown(generation, "send on closed connection", true);
                Err(TransportError::Closed)
            }
        }
    }

    /// Signals a network change or resume from sleep.
    ///
    /// Drops the current connection and reconnects immediately.  Signals
    /// arriving within the debounce window of the previous one are ignored.
    /// Returns `true` if the signal triggered a reconnect.
    pub fn notify_network_change(&self) -> bool {
        let now = Instant::now();
        let generation = {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.last_network_change {
                if now.duration_since(previous) < self.config.network_change_debounce {
                    debug!("network change ignored (debounced)");
                    return false;
                }
            }
            inner.last_network_change = Some(now);
            inner.generation
        };

        if self.is_shut_down() {
            return false;
        }

        info!("network change detected, reconnecting now");
        self.teardown(generation, "network change", false);
        self.connect_now.notify_one();
        true
    }

    /// Stops every loop, closes the connection and closes the event channel.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("transport link shutting down");
        let mut inner = self.inner.lock();
        inner.state = LinkState::Disconnected;
        inner.outbound = None;
        inner.events = None;
        for task in inner.connection_tasks.drain(..) {
            task.abort();
        }
    }

    // ── Driver ────────────────────────────────────────────────────────────────

    async fn drive(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut outcome = self.attempt_connect().await;

        loop {
            let delay = match outcome {
                ConnectOutcome::ShutDown => return,
                ConnectOutcome::Failed(_) => Some(self.next_backoff_delay()),
                ConnectOutcome::Connected
                | ConnectOutcome::AlreadyConnected
                | ConnectOutcome::InFlight => {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = self.connect_now.notified() => None,
                        _ = self.reconnect_requested.notified() => {
                            if self.state() != LinkState::Disconnected {
                                outcome = ConnectOutcome::AlreadyConnected;
                                continue;
                            }
                            Some(self.next_backoff_delay())
                        }
                    }
                }
            };

            if let Some(delay) = delay {
                info!(
                    attempt = self.reconnect_attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "scheduling relay reconnect"
                );
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = time::sleep(delay) => {}
                    _ = self.connect_now.notified() => {}
                }
            }

            outcome = self.attempt_connect().await;
        }
    }

    fn next_backoff_delay(&self) -> Duration {
        self.inner.lock().backoff.next_delay()
    }

    async fn attempt_connect(self: &Arc<Self>) -> ConnectOutcome {
        if self.is_shut_down() {
            return ConnectOutcome::ShutDown;
        }
        let Ok(_gate) = self.connect_gate.try_lock() else {
            debug!("connect already in flight");
            return ConnectOutcome::InFlight;
        };

        {
            let mut inner = self.inner.lock();
            if inner.state == LinkState::Connected {
                return ConnectOutcome::AlreadyConnected;
            }
            inner.state = LinkState::Connecting;
        }

        let url = self.config.relay_url.as_str();
        debug!(url, "connecting to relay");
        let result = time::timeout(self.config.connect_timeout, self.connector.connect(url)).await;

        let error = match result {
            Ok(Ok(connection)) => {
                if self.is_shut_down() {
                    self.inner.lock().state = LinkState::Disconnected;
                    return ConnectOutcome::ShutDown;
                }
                self.install(connection);
                info!(url, "connected to relay");
                self.emit(LinkEvent::Connected);
                return ConnectOutcome::Connected;
            }
            Ok(Err(e)) => e,
            Err(_) => TransportError::ConnectTimeout,
        };

        warn!("relay connect failed: {error}");
        self.inner.lock().state = LinkState::Disconnected;
        ConnectOutcome::Failed(error)
    }

    fn install(self: &Arc<Self>, connection: RelayConnection) {
        let RelayConnection { outbound, inbound } = connection;
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;

        inner.state = LinkState::Connected;
        inner.outbound = Some(outbound);
        inner.last_received = Some(Instant::now());
        inner.backoff.reset();

        let receive = tokio::spawn(Arc::clone(self).receive_loop(generation, inbound));
        let heartbeat = tokio::spawn(Arc::clone(self).heartbeat_loop(generation));
        for old in inner.connection_tasks.drain(..) {
            old.abort();
        }
        inner.connection_tasks = vec![receive, heartbeat];
    }

    // ── Connection loops ──────────────────────────────────────────────────────

    async fn receive_loop(self: Arc<Self>, generation: u64, mut inbound: mpsc::Receiver<WireFrame>) {
        while let Some(frame) = inbound.recv().await {
            if !self.touch(generation) {
                return;
            }
            let text = match frame {
                WireFrame::Text(text) => text,
                WireFrame::Heartbeat => {
                    trace!("heartbeat traffic");
                    continue;
                }
            };

            match decode_message(&text) {
                Ok(msg) => {
                    let Some(events) = self.events() else { continue };
                    if events.send(LinkEvent::Message(msg)).await.is_err() {
                        debug!("event receiver dropped");
                    }
                }
                Err(e) => warn!("dropping relay message: {e}"),
            }
        }
        self.teardown(generation, "relay connection closed", true);
    }

    async fn heartbeat_loop(self: Arc<Self>, generation: u64) {
        let period = self.config.heartbeat_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let (silence, outbound) = {
                let inner = self.inner.lock();
                if inner.generation != generation || inner.state != LinkState::Connected {
                    return;
                }
                let silence = inner
                    .last_received
                    .map_or(Duration::ZERO, |t| t.elapsed());
                (silence, inner.outbound.clone())
            };

            if silence >= self.config.liveness_timeout {
                warn!(
                    silence_secs = silence.as_secs(),
                    "no relay traffic within liveness timeout"
                );
                self.teardown(generation, "heartbeat timeout", true);
                return;
            }

            if let Some(outbound) = outbound {
                if let Err(mpsc::error::TrySendError::Closed(_)) = outbound.try_send(WireFrame::Heartbeat) {
                    self.teardown(generation, "heartbeat on closed connection", true);
                    return;
                }
            }
        }
    }

    /// Records inbound traffic.  Returns `false` if `generation` is stale.
    fn touch(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != LinkState::Connected {
            return false;
        }
        inner.last_received = Some(Instant::now());
        true
    }

    /// Drops the connection of `generation` if it is still the live one.
    ///
    /// Only the first caller per generation has any effect.  With
    /// `reconnect` set, the driver is asked for a backoff reconnect.
    fn teardown(&self, generation: u64, reason: &str, reconnect: bool) -> bool {
        let tasks = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state != LinkState::Connected {
                return false;
            }
            inner.state = LinkState::Disconnected;
            inner.outbound = None;
            std::mem::take(&mut inner.connection_tasks)
        };

        warn!(reason, "relay connection lost");
        for task in tasks {
            task.abort();
        }
        self.emit(LinkEvent::Disconnected);
        if reconnect {
            self.reconnect_requested.notify_one();
        }
        true
    }

    fn events(&self) -> Option<mpsc::Sender<LinkEvent>> {
        self.inner.lock().events.clone()
    }

    fn emit(&self, event: LinkEvent) {
        if let Some(events) = self.events() {
            if let Err(e) = events.try_send(event) {
                debug!("link event not delivered: {e}");
            }
        }
    }
}

impl MessageSink for TransportLink {
    fn send(&self, msg: &RelayMessage) -> Result<(), TransportError> {
        TransportLink::send(self, msg)
    }

    fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
