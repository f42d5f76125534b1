//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the intercepting proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind addresses, TLS).
    pub listener: ListenerConfig,

    /// Outbound transport settings for backend connections.
    pub upstream: UpstreamConfig,

    /// Path of the JSON file holding the selected environment and cookies.
    pub state_file: String,

    /// Named backend environments, in declaration order.
    ///
    /// Order matters twice: route matching inside an environment is
    /// last-match-wins, and `select_next` cycles environments in this order.
    pub environments: Vec<EnvironmentConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            state_file: "devtap-state.json".to_string(),
            environments: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plain HTTP bind address (e.g., "0.0.0.0:8080").
    pub http_address: String,

    /// TLS bind address; only served when `tls` is configured.
    pub https_address: Option<String>,

    /// TLS key/certificate pair for the HTTPS listener.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            http_address: "0.0.0.0:8080".to_string(),
            https_address: None,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Skip TLS certificate verification on backend connections.
    ///
    /// Scoped to this proxy's outbound HTTP and WebSocket clients only;
    /// never mutates process-wide TLS state.
    pub insecure_skip_verify: bool,
}

/// One named backend environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    /// Environment name shown in the inspector and persisted state.
    pub name: String,

    /// Origin sent to backends as `origin`/`referer`.
    pub origin: Url,

    /// Route table in declaration order (last matching prefix wins).
    pub routes: Vec<RouteEntry>,
}

/// A single route: path prefix mapped to a backend behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Path prefix matched against the browser request path.
    pub prefix: String,

    /// How traffic under this prefix is handled.
    pub kind: RouteKind,

    /// Backend base URL the stripped path is joined onto.
    pub target: Url,
}

/// Backend behavior for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// Single-page-app dev server; forwarded like `Forward`.
    Spa,
    /// Plain HTTP forwarding.
    Forward,
    /// WebSocket bridge.
    Websocket,
}
