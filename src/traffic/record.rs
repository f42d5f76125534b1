//! Traffic record types for the inspector.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use uuid::Uuid;

use crate::stomp::StompFrame;
use crate::traffic::sink::ByteSink;

/// Which way a WebSocket event travelled through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Backend to browser.
    Incoming,
    /// Browser to backend.
    Outgoing,
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Response metadata filled in once backend headers arrive.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

/// One captured HTTP exchange.
///
/// The forwarder exclusively creates and mutates a record; the
/// `TrafficLog` owns its lifetime and list membership; the UI only reads.
pub struct HttpExchangeRecord {
    /// Stable identity; a correlated exchange reuses its preflight's key.
    pub key: Uuid,
    pub created_at: u64,
    pub url: String,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub request_headers: Vec<(String, String)>,
    pub request_body: ByteSink,
    pub response_body: ByteSink,
    response: Mutex<Option<ResponseMeta>>,
    preflight: OnceLock<Arc<HttpExchangeRecord>>,
}

impl HttpExchangeRecord {
    pub(crate) fn new(
        key: Uuid,
        method: String,
        url: String,
        path: String,
        query: Option<String>,
        request_headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            key,
            created_at: now_millis(),
            url,
            method,
            path,
            query,
            request_headers,
            request_body: ByteSink::new(),
            response_body: ByteSink::new(),
            response: Mutex::new(None),
            preflight: OnceLock::new(),
        }
    }

    /// First request header with the given name, compared case-insensitively.
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// A CORS preflight: `OPTIONS` carrying `access-control-request-method`.
    pub fn is_preflight(&self) -> bool {
        self.method == "OPTIONS" && self.request_header("access-control-request-method").is_some()
    }

    /// Method a preflight asks permission for.
    pub fn requested_method(&self) -> Option<&str> {
        self.request_header("access-control-request-method")
    }

    pub fn set_response(&self, status: u16, headers: Vec<(String, String)>) {
        *self.response.lock().unwrap() = Some(ResponseMeta { status, headers });
    }

    pub fn response(&self) -> Option<ResponseMeta> {
        self.response.lock().unwrap().clone()
    }

    /// Attach the correlated preflight; once set it is never cleared.
    pub(crate) fn set_preflight(&self, preflight: Arc<HttpExchangeRecord>) {
        let _ = self.preflight.set(preflight);
    }

    pub fn preflight(&self) -> Option<&Arc<HttpExchangeRecord>> {
        self.preflight.get()
    }
}

/// What a WebSocket event record describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    StompFrame {
        command: Option<String>,
        headers: Vec<(String, String)>,
        body: Bytes,
    },
    Ping,
    ReadyState(u8),
    Error {
        code: Option<String>,
        reason: Option<String>,
    },
}

impl WsEvent {
    pub(crate) fn from_frame(frame: &StompFrame) -> Self {
        WsEvent::StompFrame {
            command: frame.command.clone(),
            headers: frame.headers.clone(),
            body: frame.binary_body.clone(),
        }
    }
}

/// One captured WebSocket event; immutable once appended.
#[derive(Debug, Clone)]
pub struct WsEventRecord {
    pub key: Uuid,
    pub t: u64,
    pub direction: Direction,
    pub event: WsEvent,
}
