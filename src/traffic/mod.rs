//! Traffic capture subsystem.
//!
//! # Data Flow
//! ```text
//! HttpForwarder ──┐
//!                 ├─→ log.rs (append, correlate, cap)
//! WebSocketBridge ┘          │
//!                            ▼
//!              observable record lists → inspector UI
//! ```
//!
//! # Design Decisions
//! - Records are created by the traffic engine and only read by the UI
//! - Bodies stream into append-only `ByteSink`s while the exchange is
//!   still in flight; the log never buffers a body itself

pub mod log;
pub mod record;
pub mod sink;

pub use log::TrafficLog;
pub use record::{Direction, HttpExchangeRecord, ResponseMeta, WsEvent, WsEventRecord};
pub use sink::ByteSink;
