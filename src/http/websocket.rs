//! WebSocket upgrade handling.
//!
//! # Data Flow
//! ```text
//! GET /ws → WebSocketUpgrade → 101 Switching Protocols
//!     → tokio task per connection → EchoSession::run
//! ```
//!
//! # Design Decisions
//! - Any origin may upgrade; there is no handshake payload
//! - Failed upgrades are logged and the request abandoned
//! - Session errors stay inside the session's task

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::session::EchoSession;

/// `/ws`: upgrade the connection and echo messages until either side stops.
pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "WebSocket upgrade rejected");
            return rejection.into_response();
        }
    };

    let guard = state.sessions.track();
    let session_id = guard.id();

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(session_id = %session_id, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        // outcome is logged by the session
        let _ = EchoSession::new(socket, guard).run().await;
    })
}
