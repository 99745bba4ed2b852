//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → GET /, /hello → reflect.rs (headers + resolved client IP)
//!     → POST /echo    → reflect.rs (body copy)
//!     → /ws           → websocket.rs (upgrade) → session::EchoSession
//! ```

pub mod reflect;
pub mod request;
pub mod server;
pub mod websocket;

pub use request::{MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
pub use server::{bind, AppState, HttpServer, ServerError};
