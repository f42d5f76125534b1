//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Serve the same handler on the plain and TLS listeners
//! - Detect WebSocket upgrades on websocket-typed routes
//! - Keep the per-environment bridge set in sync with the store
//!
//! # Design Decisions
//! - All dependencies (store, log, client) are injected through
//!   `AppState`; nothing is looked up through a global
//! - One environment snapshot per request, taken at the top of the
//!   handler and used for both upgrade detection and forwarding

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyConfig, RouteKind};
use crate::env::EnvironmentStore;
use crate::http::forwarder;
use crate::http::websocket::BridgeSet;
use crate::net::{insecure_client_config, load_tls_config};
use crate::observable::Subscription;
use crate::routing::resolve;
use crate::traffic::TrafficLog;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub env_store: Arc<EnvironmentStore>,
    pub log: Arc<TrafficLog>,
    pub client: reqwest::Client,
    pub bridges: Arc<ArcSwap<BridgeSet>>,
}

/// Error type for server construction and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build backend HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to build backend TLS config: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid bind address {address}: {source}")]
    BindAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the intercepting proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    _env_subscription: Subscription,
}

impl HttpServer {
    /// Wire up handlers, the backend client, and the bridge set.
    pub fn new(
        config: ProxyConfig,
        env_store: Arc<EnvironmentStore>,
        log: Arc<TrafficLog>,
    ) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.upstream.insecure_skip_verify)
            .build()?;

        let ws_tls = if config.upstream.insecure_skip_verify {
            Some(insecure_client_config()?)
        } else {
            None
        };

        let bridges = Arc::new(ArcSwap::from_pointee(BridgeSet::for_environment(
            &env_store.active(),
            Arc::clone(&log),
            ws_tls.clone(),
        )));

        // Tear down and rebuild the bridge set synchronously on every
        // environment change, before the next request can resolve a route.
        let env_subscription = {
            let store = Arc::clone(&env_store);
            let log = Arc::clone(&log);
            let bridges = Arc::clone(&bridges);
            env_store.on_change(move || {
                let set =
                    BridgeSet::for_environment(&store.active(), Arc::clone(&log), ws_tls.clone());
                tracing::debug!(prefixes = ?set.prefixes(), "WebSocket bridges rebuilt");
                bridges.store(Arc::new(set));
            })
        };

        let state = AppState {
            env_store,
            log,
            client,
            bridges,
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            _env_subscription: env_subscription,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on the given plain listener, and on the TLS listener when
    /// one is configured, until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP listener starting");

        let handle = axum_server::Handle::new();

        if let (Some(address), Some(tls)) = (
            self.config.listener.https_address.as_ref(),
            self.config.listener.tls.as_ref(),
        ) {
            let https_addr: SocketAddr =
                address
                    .parse()
                    .map_err(|source| ServerError::BindAddress {
                        address: address.clone(),
                        source,
                    })?;
            let rustls_config =
                load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

            tracing::info!(address = %https_addr, "HTTPS listener starting");
            let app = self.router.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                if let Err(error) = axum_server::bind_rustls(https_addr, rustls_config)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
                {
                    tracing::error!(%error, "HTTPS server error");
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(handle))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: bridge WebSocket upgrades on websocket routes,
/// forward everything else.
async fn proxy_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request<Body>,
) -> Response {
    let env = state.env_store.active();

    if let Ok(upgrade) = ws {
        let path = request.uri().path();
        if let Some(resolved) = resolve(path, env.routes()) {
            if resolved.route.kind == RouteKind::Websocket {
                if let Some(bridge) = state.bridges.load().find(resolved.prefix) {
                    tracing::debug!(%path, prefix = %resolved.prefix, "WebSocket upgrade");
                    return upgrade.on_upgrade(move |socket| bridge.run(socket));
                }
            }
        }
    }

    forwarder::forward(&state, env, request).await
}

/// Wait for shutdown signal (Ctrl+C), then drain the TLS listener too.
async fn shutdown_signal(handle: axum_server::Handle) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
    handle.graceful_shutdown(None);
}
