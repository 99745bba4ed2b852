//! Connection-level concerns shared by the HTTP handlers.
//!
//! # Data Flow
//! ```text
//! Accepted connection (peer SocketAddr via ConnectInfo)
//!     → client_addr.rs (best-effort client IP for the reflector)
//!     → connection.rs (session IDs and live-session tracking for /ws)
//! ```

pub mod client_addr;
pub mod connection;

pub use client_addr::{resolve, InboundRequest, Resolution, ResolutionStep, ResolveError, ResolvedAddress};
pub use connection::{SessionGuard, SessionId, SessionTracker};
