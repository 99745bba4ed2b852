//! WebSocket sessions.
//!
//! One session per upgraded connection. Sessions share no state with each
//! other; each owns its channel until the loop exits.

pub mod echo;

pub use echo::{EchoSession, SessionEnd, SessionError, SessionStats};
