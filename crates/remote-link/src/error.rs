//! Transport error taxonomy.
//!
//! None of these are fatal.  A failure on the link is logged, the link moves
//! to Disconnected, and the driver schedules a reconnect.

use remote_core::ProtocolError;
use thiserror::Error;

/// Errors raised by the relay link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connect handshake failed.
    #[error("failed to connect to relay at {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// The connect handshake did not finish within the configured timeout.
    #[error("connect to relay timed out")]
    ConnectTimeout,

    /// There is no open connection right now.
    #[error("not connected to relay")]
    NotConnected,

    /// The connection closed underneath a send.
    #[error("relay connection closed")]
    Closed,

    /// The outbound queue is full; the message was dropped.
    #[error("outbound queue full, message dropped")]
    Saturated,

    /// The link was shut down.
    #[error("link is shut down")]
    Shutdown,

    /// A message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
