//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → resolver.rs (scan active environment's table, declaration order)
//!     → ResolvedRoute { prefix, entry, stripped path }
//!     → forwarder joins stripped path onto the route target
//! ```
//!
//! # Design Decisions
//! - Route tables are per environment and immutable after startup
//! - Deterministic: same table and path always resolve identically
//! - Last match wins (operator-visible contract)

pub mod resolver;

pub use resolver::{resolve, ResolvedRoute};
