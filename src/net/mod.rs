//! Network plumbing shared by the listeners and backend clients.
//!
//! # Design Decisions
//! - One fixed key/cert pair loaded at startup for the TLS listener
//! - Certificate-verification bypass is an explicit per-client option,
//!   never a process-wide patch

pub mod tls;

pub use tls::{insecure_client_config, load_tls_config};
