//! WebSocket bridging with STOMP inspection.
//!
//! # Responsibilities
//! - Hold one bridge per websocket route of the active environment
//! - Open a matching backend connection per browser connection
//! - Buffer browser messages until the backend is open, then drain in
//!   arrival order
//! - Feed both directions through independent STOMP parsers into the
//!   traffic log
//! - Propagate closes with their code/reason
//!
//! # Data Flow
//! ```text
//! Browser ── frames ──→ Bridge ── frames ──→ Backend
//!              │  outgoing parser │ incoming parser
//!              └────────→ TrafficLog ←───────┘
//! ```
//!
//! # Design Decisions
//! - The bridge set is swapped atomically when the environment changes;
//!   connections in flight keep their old bridge until they close
//! - Frames pass through byte-for-byte; parsing is observation only
//! - A failed backend connect abandons that bridge instance without
//!   touching the listener

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{self, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as BackendMessage;
use tokio_tungstenite::{
    connect_async, connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::config::RouteKind;
use crate::env::EnvSnapshot;
use crate::stomp::StompParser;
use crate::traffic::{Direction, TrafficLog};

// WebSocket API numeric ready states.
const READY_STATE_OPEN: u8 = 1;
const READY_STATE_CLOSED: u8 = 3;

/// Delay before propagating a backend close, so a final in-flight frame
/// still reaches the parser and the log.
const CLOSE_GRACE: Duration = Duration::from_millis(100);

type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The bridges serving one environment's websocket routes.
pub struct BridgeSet {
    bridges: Vec<Arc<WsBridge>>,
}

impl BridgeSet {
    /// Build bridges for every websocket-typed route of `env`.
    pub fn for_environment(
        env: &EnvSnapshot,
        log: Arc<TrafficLog>,
        tls: Option<Arc<rustls::ClientConfig>>,
    ) -> Self {
        let bridges = env
            .routes()
            .iter()
            .filter(|route| route.kind == RouteKind::Websocket)
            .map(|route| {
                Arc::new(WsBridge {
                    prefix: route.prefix.clone(),
                    target: route.target.clone(),
                    log: Arc::clone(&log),
                    tls: tls.clone(),
                })
            })
            .collect();
        Self { bridges }
    }

    /// Look up the bridge installed for a route prefix.
    pub fn find(&self, prefix: &str) -> Option<Arc<WsBridge>> {
        self.bridges
            .iter()
            .find(|bridge| bridge.prefix == prefix)
            .cloned()
    }

    pub fn prefixes(&self) -> Vec<&str> {
        self.bridges.iter().map(|b| b.prefix.as_str()).collect()
    }
}

/// Bridge for one websocket route entry.
pub struct WsBridge {
    prefix: String,
    target: Url,
    log: Arc<TrafficLog>,
    tls: Option<Arc<rustls::ClientConfig>>,
}

impl WsBridge {
    /// Serve one browser connection until either side closes.
    pub async fn run(self: Arc<Self>, browser: WebSocket) {
        let mut outgoing_parser = StompParser::new();
        let mut incoming_parser = StompParser::new();
        for (parser, direction) in [
            (&mut outgoing_parser, Direction::Outgoing),
            (&mut incoming_parser, Direction::Incoming),
        ] {
            let log = Arc::clone(&self.log);
            parser.on_frame(move |frame| log.log_stomp_frame(direction, frame));
            let log = Arc::clone(&self.log);
            parser.on_ping(move || log.log_ping(direction));
        }

        let (mut browser_tx, mut browser_rx) = browser.split();

        let connect = self.connect_backend();
        tokio::pin!(connect);

        // Messages arriving before the backend is open wait here and are
        // drained in arrival order once it is.
        let mut pending: Vec<BackendMessage> = Vec::new();

        let backend = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok(stream) => break stream,
                    Err(error) => {
                        tracing::error!(target = %self.target, %error, "Backend WebSocket connection failed");
                        return;
                    }
                },
                msg = browser_rx.next() => match msg {
                    Some(Ok(ws::Message::Close(_))) | Some(Err(_)) | None => {
                        // No backend counterpart to close yet; abandon.
                        return;
                    }
                    Some(Ok(msg)) => {
                        feed_browser_message(&mut outgoing_parser, &msg);
                        if let Some(msg) = to_backend(msg) {
                            pending.push(msg);
                        }
                    }
                },
            }
        };

        self.log
            .log_ready_state(Direction::Incoming, READY_STATE_OPEN);
        tracing::debug!(prefix = %self.prefix, target = %self.target, "Backend WebSocket open");

        let (mut backend_tx, mut backend_rx) = backend.split();
        for msg in pending.drain(..) {
            if let Err(error) = backend_tx.send(msg).await {
                tracing::error!(%error, "Failed to drain pending WebSocket messages");
                return;
            }
        }

        let mut browser_open = true;
        loop {
            tokio::select! {
                msg = browser_rx.next(), if browser_open => match msg {
                    Some(Ok(ws::Message::Close(frame))) => {
                        browser_open = false;
                        let close = frame.map(|f| CloseFrame {
                            code: f.code.into(),
                            reason: f.reason.as_str().into(),
                        });
                        let _ = backend_tx.send(BackendMessage::Close(close)).await;
                    }
                    Some(Ok(msg)) => {
                        feed_browser_message(&mut outgoing_parser, &msg);
                        if let Some(msg) = to_backend(msg) {
                            if let Err(error) = backend_tx.send(msg).await {
                                tracing::error!(%error, "Backend WebSocket write failed");
                            }
                        }
                    }
                    Some(Err(error)) => {
                        browser_open = false;
                        tracing::error!(%error, "Browser WebSocket error");
                        let _ = backend_tx.send(BackendMessage::Close(None)).await;
                    }
                    None => {
                        browser_open = false;
                        let _ = backend_tx.send(BackendMessage::Close(None)).await;
                    }
                },
                msg = backend_rx.next() => match msg {
                    Some(Ok(BackendMessage::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (
                                Some(u16::from(frame.code).to_string()),
                                Some(frame.reason.to_string()),
                            ),
                            None => (None, None),
                        };
                        self.finish_browser_side(&mut browser_tx, code, reason).await;
                        return;
                    }
                    Some(Ok(msg)) => {
                        feed_backend_message(&mut incoming_parser, &msg);
                        if let Some(msg) = to_browser(msg) {
                            if browser_open && browser_tx.send(msg).await.is_err() {
                                browser_open = false;
                                let _ = backend_tx.send(BackendMessage::Close(None)).await;
                            }
                        }
                    }
                    Some(Err(error)) => {
                        // Not terminal by itself; the close (or end of
                        // stream) that follows drives teardown.
                        tracing::error!(%error, "Backend WebSocket error");
                    }
                    None => {
                        self.finish_browser_side(&mut browser_tx, None, None).await;
                        return;
                    }
                },
            }
        }
    }

    /// Grace-delay, close the browser side, and record the close.
    async fn finish_browser_side(
        &self,
        browser_tx: &mut (impl Sink<ws::Message> + Unpin),
        code: Option<String>,
        reason: Option<String>,
    ) {
        tokio::time::sleep(CLOSE_GRACE).await;

        let close_frame = code
            .as_deref()
            .and_then(|c| c.parse::<u16>().ok())
            .map(|code| ws::CloseFrame {
                code,
                reason: reason.clone().unwrap_or_default().into(),
            });
        let _ = browser_tx.send(ws::Message::Close(close_frame)).await;

        self.log
            .log_ready_state(Direction::Incoming, READY_STATE_CLOSED);
        self.log.log_error(Direction::Incoming, code, reason);
    }

    async fn connect_backend(&self) -> Result<BackendSocket, tokio_tungstenite::tungstenite::Error> {
        let url = websocket_url(&self.target);
        let (stream, _response) = match &self.tls {
            Some(config) => {
                connect_async_tls_with_config(
                    url,
                    None,
                    false,
                    Some(Connector::Rustls(Arc::clone(config))),
                )
                .await?
            }
            None => connect_async(url).await?,
        };
        Ok(stream)
    }
}

/// Map an http(s) target onto the ws(s) scheme.
fn websocket_url(target: &Url) -> String {
    let raw = target.as_str();
    if let Some(rest) = raw.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = raw.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        raw.to_string()
    }
}

fn feed_browser_message(parser: &mut StompParser, msg: &ws::Message) {
    match msg {
        ws::Message::Text(text) => parser.parse_text(text.as_str()),
        ws::Message::Binary(bytes) => parser.parse_chunk(bytes),
        _ => {}
    }
}

fn feed_backend_message(parser: &mut StompParser, msg: &BackendMessage) {
    match msg {
        BackendMessage::Text(text) => parser.parse_text(text.as_str()),
        BackendMessage::Binary(bytes) => parser.parse_chunk(bytes),
        _ => {}
    }
}

fn to_backend(msg: ws::Message) -> Option<BackendMessage> {
    match msg {
        ws::Message::Text(text) => Some(BackendMessage::Text(text.as_str().into())),
        ws::Message::Binary(bytes) => Some(BackendMessage::Binary(bytes)),
        ws::Message::Ping(bytes) => Some(BackendMessage::Ping(bytes)),
        ws::Message::Pong(bytes) => Some(BackendMessage::Pong(bytes)),
        ws::Message::Close(_) => None,
    }
}

fn to_browser(msg: BackendMessage) -> Option<ws::Message> {
    match msg {
        BackendMessage::Text(text) => Some(ws::Message::Text(text.as_str().into())),
        BackendMessage::Binary(bytes) => Some(ws::Message::Binary(bytes)),
        BackendMessage::Ping(bytes) => Some(ws::Message::Ping(bytes)),
        BackendMessage::Pong(bytes) => Some(ws::Message::Pong(bytes)),
        BackendMessage::Close(_) | BackendMessage::Frame(_) => None,
    }
}
