//! Metrics collection and exposition.
//!
//! # Metrics
//! - `echo_reflect_requests_total` (counter): reflector requests served
//! - `echo_client_ip_resolutions_total` (counter): resolutions by `source`
//! - `echo_body_requests_total` (counter): `/echo` requests served
//! - `echo_body_bytes_total` (counter): body bytes streamed back by `/echo`
//! - `echo_ws_sessions_total` (counter): sessions opened
//! - `echo_ws_sessions_active` (gauge): sessions currently open
//! - `echo_ws_messages_echoed_total` (counter): echoed messages by `kind`
//! - `echo_ws_session_errors_total` (counter): terminal errors by `side`
//!
//! Without an installed recorder every helper is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::session::SessionError;

pub const REFLECT_REQUESTS_TOTAL: &str = "echo_reflect_requests_total";
pub const CLIENT_IP_RESOLUTIONS_TOTAL: &str = "echo_client_ip_resolutions_total";
pub const BODY_REQUESTS_TOTAL: &str = "echo_body_requests_total";
pub const BODY_BYTES_TOTAL: &str = "echo_body_bytes_total";
pub const WS_SESSIONS_TOTAL: &str = "echo_ws_sessions_total";
pub const WS_SESSIONS_ACTIVE: &str = "echo_ws_sessions_active";
pub const WS_MESSAGES_ECHOED_TOTAL: &str = "echo_ws_messages_echoed_total";
pub const WS_SESSION_ERRORS_TOTAL: &str = "echo_ws_session_errors_total";

/// Install the global Prometheus recorder and serve it over HTTP on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_reflect() {
    counter!(REFLECT_REQUESTS_TOTAL).increment(1);
}

/// Record which resolution step answered, or `"none"`.
pub fn record_resolution(source: &'static str) {
    counter!(CLIENT_IP_RESOLUTIONS_TOTAL, "source" => source).increment(1);
}

pub fn record_body_echo() {
    counter!(BODY_REQUESTS_TOTAL).increment(1);
}

pub fn record_body_bytes(bytes: u64) {
    counter!(BODY_BYTES_TOTAL).increment(bytes);
}

pub fn session_opened() {
    counter!(WS_SESSIONS_TOTAL).increment(1);
    gauge!(WS_SESSIONS_ACTIVE).increment(1.0);
}

pub fn session_closed() {
    gauge!(WS_SESSIONS_ACTIVE).decrement(1.0);
}

pub fn record_echoed(kind: &'static str) {
    counter!(WS_MESSAGES_ECHOED_TOTAL, "kind" => kind).increment(1);
}

pub fn record_session_error(error: &SessionError) {
    let side = match error {
        SessionError::Read(_) => "read",
        SessionError::Write(_) => "write",
    };
    counter!(WS_SESSION_ERRORS_TOTAL, "side" => side).increment(1);
}
