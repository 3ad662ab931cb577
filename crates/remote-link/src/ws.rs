//! WebSocket implementation of [`RelayConnector`].
//!
//! Each connection is split into a writer task and a reader task:
//!
//! ```text
//! link ── outbound mpsc ──▶ writer task ──▶ WebSocket sink
//! link ◀── inbound mpsc ─── reader task ◀── WebSocket stream
//! ```
//!
//! Heartbeats go out as WebSocket Ping frames.  Incoming Ping and Pong
//! frames are reported to the link as [`WireFrame::Heartbeat`] so they count as
//! traffic for the liveness check.  `tokio-tungstenite` answers incoming
//! pings on its own.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, warn};

use crate::connector::{RelayConnection, RelayConnector, WireFrame};
use crate::error::TransportError;

const DEFAULT_OUTBOUND_CAPACITY: usize = 32;
const INBOUND_CAPACITY: usize = 128;

/// Opens relay connections over WebSocket (`ws://` or `wss://`).
#[derive(Debug, Clone)]
pub struct WsConnector {
    outbound_capacity: usize,
}

impl WsConnector {
    /// `outbound_capacity` bounds the number of frames queued for writing.
    /// When the queue is full, further sends are dropped by the link.
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            outbound_capacity: outbound_capacity.max(1),
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_CAPACITY)
    }
}

#[async_trait]
impl RelayConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<RelayConnection, TransportError> {
        let (stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<WireFrame>(self.outbound_capacity);
        let (in_tx, in_rx) = mpsc::channel::<WireFrame>(INBOUND_CAPACITY);

        // Writer: drains the outbound queue until the link drops its sender.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let msg = match frame {
                    WireFrame::Text(text) => WsMessage::Text(text),
                    WireFrame::Heartbeat => WsMessage::Ping(Vec::new()),
                };
                if let Err(e) = sink.send(msg).await {
                    debug!("relay write failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: forwards frames until the socket ends or the link stops listening.
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    next = source.next() => next,
                    _ = in_tx.closed() => break,
                };

                let frame = match next {
                    Some(Ok(WsMessage::Text(text))) => WireFrame::Text(text),
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => WireFrame::Heartbeat,
                    Some(Ok(WsMessage::Close(close))) => {
                        debug!(?close, "relay closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        debug!("ignoring non-text relay frame");
                        continue;
                    }
                    Some(Err(e)) => {
                        warn!("relay read error: {e}");
                        break;
                    }
                    None => break,
                };

                if in_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(RelayConnection {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
