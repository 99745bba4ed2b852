//! Per-connection WebSocket echo loop.
//!
//! # State Machine
//! ```text
//! Open → Reading ─(text/binary)→ Writing ─(ok)→ Reading
//!           │                        │
//!           └─(close/end/error)──────┴─(error)──→ Closed
//! ```
//!
//! The channel is closed exactly once when the loop exits, whichever side failed.

use std::fmt;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;

use crate::net::connection::{SessionGuard, SessionId};
use crate::observability::metrics;

/// Transport failures that end a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent a Close frame.
    RemoteClosed,
    /// The underlying stream finished without a Close frame.
    StreamEnded,
}

/// Summary of a session that ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub echoed: u64,
    pub end: SessionEnd,
}

/// Echoes every text or binary message back over the channel it arrived on.
pub struct EchoSession<C> {
    channel: C,
    guard: SessionGuard,
}

impl<C, E> EchoSession<C>
where
    C: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Unpin,
    E: fmt::Display,
{
    /// Take exclusive ownership of an upgraded channel.
    pub fn new(channel: C, guard: SessionGuard) -> Self {
        Self { channel, guard }
    }

    pub fn id(&self) -> SessionId {
        self.guard.id()
    }

    /// Run until the peer closes or a read/write fails, then release the channel.
    pub async fn run(mut self) -> Result<SessionStats, SessionError> {
        let id = self.id();
        metrics::session_opened();
        tracing::debug!(session_id = %id, "Echo session opened");

        let result = self.echo_loop().await;

        if let Err(e) = self.channel.close().await {
            tracing::debug!(session_id = %id, error = %e, "Channel close failed");
        }
        metrics::session_closed();

        match &result {
            Ok(stats) => tracing::debug!(
                session_id = %id,
                echoed = stats.echoed,
                end = ?stats.end,
                "Echo session closed"
            ),
            Err(e) => {
                metrics::record_session_error(e);
                tracing::warn!(session_id = %id, error = %e, "Echo session terminated");
            }
        }
        result
    }

    async fn echo_loop(&mut self) -> Result<SessionStats, SessionError> {
        let id = self.id();
        let mut echoed = 0;

        loop {
            let message = match self.channel.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(SessionError::Read(e.to_string())),
                None => {
                    return Ok(SessionStats { echoed, end: SessionEnd::StreamEnded });
                }
            };

            let kind = match &message {
                Message::Text(text) => {
                    tracing::debug!(session_id = %id, payload = %text.as_str(), "recv");
                    "text"
                }
                Message::Binary(data) => {
                    tracing::debug!(session_id = %id, len = data.len(), "recv");
                    "binary"
                }
                // answered by the transport
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    tracing::trace!(session_id = %id, frame = ?frame, "Close frame received");
                    return Ok(SessionStats { echoed, end: SessionEnd::RemoteClosed });
                }
            };

            self.channel
                .send(message)
                .await
                .map_err(|e| SessionError::Write(e.to_string()))?;
            echoed += 1;
            metrics::record_echoed(kind);
        }
    }
}
