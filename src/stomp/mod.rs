//! STOMP frame inspection.
//!
//! Used purely for inspection of bridged WebSocket traffic, not
//! enforcement: frames are decoded, logged, and dropped. The wire bytes
//! always pass through the bridge untouched.

pub mod parser;

pub use parser::{StompFrame, StompParser};
