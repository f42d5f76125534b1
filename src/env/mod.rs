//! Environment selection and cookie state.
//!
//! # Data Flow
//! ```text
//! config environments (immutable table)
//!     → store.rs (active selector + per-env cookie jars)
//!     → EnvSnapshot captured once per exchange by handlers
//!
//! On every change:
//!     subscribers notified (bridge rebuild, UI)
//!     → persist.rs writes {selected, cookies} JSON best-effort
//! ```
//!
//! # Design Decisions
//! - Constructed once at startup and passed by handle, never looked up
//!   through a global
//! - Cookies are scoped per environment, not shared
//! - Disk state is advisory; in-memory state is authoritative

pub mod persist;
pub mod store;

pub use store::{EnvSnapshot, EnvironmentStore};
