//! The seam between the transport link and the socket underneath it.
//!
//! A [`RelayConnector`] opens one connection and hands back a pair of
//! channels.  The link only ever talks to those channels, so tests can drive
//! it with an in-memory connection and no network.
//!
//! Contract for implementations:
//!
//! - Frames pushed into `outbound` are written to the socket in order.
//!   Dropping every `outbound` sender closes the socket.
//! - Every frame read from the socket is pushed into `inbound`.  A
//!   [`WireFrame::Heartbeat`] stands for heartbeat traffic (pings and pongs).
//! - When the socket closes or fails, `inbound` is closed.  When the link
//!   drops the `inbound` receiver the implementation stops reading.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// One unit of traffic on a relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// A JSON-encoded relay message.
    Text(String),
    /// Heartbeat ping (outbound) or heartbeat traffic (inbound).
    Heartbeat,
}

/// An open relay connection, as a pair of channels.
#[derive(Debug)]
pub struct RelayConnection {
    pub outbound: mpsc::Sender<WireFrame>,
    pub inbound: mpsc::Receiver<WireFrame>,
}

/// Opens relay connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayConnector: Send + Sync {
    /// Opens one connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectFailed`] when the handshake fails.
    async fn connect(&self, url: &str) -> Result<RelayConnection, TransportError>;
}
