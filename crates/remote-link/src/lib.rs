//! # remote-link
//!
//! The process-wide connection to the relay service, and the optional
//! peer-to-peer command channel negotiated through it.
//!
//! # Why a dedicated link crate? (for beginners)
//!
//! Both the agent and the viewer keep exactly one connection to the relay for
//! their whole lifetime.  Networks drop, laptops sleep, proxies silently kill
//! idle sockets; the link hides all of that behind a small API:
//!
//! - `TransportLink::start()` spawns a driver task that connects and keeps
//!   reconnecting with exponential backoff, forever.
//! - `TransportLink::send()` is best-effort and never blocks the caller.  If
//!   the socket is gone the message is dropped and a reconnect is scheduled.
//! - A heartbeat loop notices silent connections (no traffic for ~60 s) and
//!   forces a reconnect.
//! - `TransportLink::notify_network_change()` reconnects immediately after a
//!   network switch or resume from sleep, at most once per ~10 s.
//!
//! Socket details are behind the [`connector::RelayConnector`] trait;
//! production uses [`ws::WsConnector`] (WebSocket via `tokio-tungstenite`) and
//! tests plug in an in-memory connector.
//!
//! The [`peer`] module defines the peer channel used for low-latency command
//! delivery.  With the `webrtc` cargo feature it is a WebRTC data channel;
//! without it every session stays relay-only.

pub mod config;
pub mod connector;
pub mod error;
pub mod link;
pub mod peer;
pub mod ws;

pub use config::LinkConfig;
pub use connector::{RelayConnection, RelayConnector, WireFrame};
pub use error::TransportError;
pub use link::{ConnectOutcome, LinkEvent, LinkState, MessageSink, TransportLink};
pub use ws::WsConnector;
