//! devtap — a developer-facing intercepting reverse proxy.
//!
//! Sits between a browser and one or more backend origins, forwards
//! HTTP and WebSocket traffic transparently while capturing every
//! exchange and frame for live inspection, and redirects traffic
//! between named backend environments without restarting.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                 INTERCEPTING PROXY              │
//!                    │                                                 │
//!  Browser request   │  ┌─────────┐   ┌──────────┐   ┌─────────────┐  │
//!  ──────────────────┼─▶│  http   │──▶│ routing  │──▶│  forwarder  │──┼──▶ Backend
//!                    │  │ server  │   │ resolver │   │ / ws bridge │  │    (per env)
//!                    │  └─────────┘   └──────────┘   └──────┬──────┘  │
//!                    │        ▲             ▲               │         │
//!                    │        │       ┌─────┴─────┐   ┌─────▼──────┐  │
//!                    │        │       │ env store │   │ traffic log│  │
//!                    │        │       │ (cookies, │   │ (records,  │  │
//!                    │        │       │ selector) │   │ stomp)     │  │
//!                    │        │       └───────────┘   └─────┬──────┘  │
//!                    │        │                             ▼         │
//!                    │        └──────────────────── inspector UI      │
//!                    └────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod stomp;
pub mod traffic;

// Shared state
pub mod env;
pub mod observable;

// Network plumbing
pub mod net;

pub use config::ProxyConfig;
pub use env::EnvironmentStore;
pub use http::HttpServer;
pub use traffic::TrafficLog;
