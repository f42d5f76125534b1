//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, upgrade detection)
//!     → forwarder.rs (route resolution, streaming proxy, record capture)
//!     or
//!     → websocket.rs (bridge to backend, STOMP inspection)
//! ```

pub mod forwarder;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer, ServerError};
pub use websocket::{BridgeSet, WsBridge};
