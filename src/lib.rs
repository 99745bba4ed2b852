//! HTTP/WebSocket echo and client-IP reflector library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod session;

pub use config::EchoConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
