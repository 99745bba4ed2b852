//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use echo_reflector::config::EchoConfig;
use echo_reflector::http::{self, HttpServer};
use echo_reflector::lifecycle::Shutdown;
use echo_reflector::net::SessionTracker;

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub sessions: SessionTracker,
}

/// Start a server with `config` on `127.0.0.1:0`.
pub async fn spawn_server(mut config: EchoConfig) -> TestServer {
    config.listener.bind_address = "127.0.0.1:0".into();
    let listener = http::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config);
    let sessions = server.sessions().clone();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer { addr, shutdown, sessions }
}

/// Poll until no sessions are live, or give up after two seconds.
#[allow(dead_code)]
pub async fn wait_for_idle(sessions: &SessionTracker) -> bool {
    for _ in 0..200 {
        if sessions.active_count() == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
