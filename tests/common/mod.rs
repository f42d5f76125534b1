//! Shared helpers for integration tests: mock backends and a proxy
//! instance bound to an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use devtap::config::{EnvironmentConfig, ProxyConfig, RouteEntry, RouteKind};
use devtap::env::EnvironmentStore;
use devtap::http::HttpServer;
use devtap::traffic::TrafficLog;

/// Start a raw HTTP backend that answers every request with 200 and a
/// body echoing the request head it received (request line + headers).
///
/// The response carries a `set-cookie`, a cacheable `cache-control`, and
/// an `x-backend` header with `tag`, so tests can observe which backend
/// served a request and how the proxy rewrote the response.
pub async fn start_echo_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock backend");
    let addr = listener.local_addr().expect("Failed to get backend address");

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buffer = [0u8; 4096];
                let mut data = Vec::new();
                let head_end = loop {
                    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                        let head = String::from_utf8_lossy(&data[..pos]);
                        let body_len = head
                            .lines()
                            .find_map(|line| {
                                let (name, value) = line.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        if data.len() >= pos + 4 + body_len {
                            break pos;
                        }
                    }
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => data.extend_from_slice(&buffer[..n]),
                    }
                };

                let head = String::from_utf8_lossy(&data[..head_end]).into_owned();

                let response = format!(
                    "HTTP/1.1 200 OK\r\n\
                     content-type: text/plain\r\n\
                     content-length: {}\r\n\
                     cache-control: max-age=3600\r\n\
                     set-cookie: sid=backend; Path=/\r\n\
                     x-backend: {tag}\r\n\
                     connection: close\r\n\
                     \r\n\
                     {head}",
                    head.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    addr
}

/// An address nothing is listening on (bound once, then released).
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind throwaway listener");
    let addr = listener.local_addr().expect("Failed to get address");
    drop(listener);
    addr
}

/// One environment with the given routes and a fixed origin.
pub fn environment(name: &str, routes: Vec<RouteEntry>) -> EnvironmentConfig {
    EnvironmentConfig {
        name: name.to_string(),
        origin: "https://app.example.com".parse().expect("Invalid origin"),
        routes,
    }
}

/// Forwarding route entry for `prefix` pointing at `backend`.
pub fn forward_route(prefix: &str, backend: SocketAddr) -> RouteEntry {
    RouteEntry {
        prefix: prefix.to_string(),
        kind: RouteKind::Forward,
        target: format!("http://{backend}").parse().expect("Invalid target"),
    }
}

/// Websocket route entry for `prefix` pointing at `backend`.
pub fn websocket_route(prefix: &str, backend: SocketAddr) -> RouteEntry {
    RouteEntry {
        prefix: prefix.to_string(),
        kind: RouteKind::Websocket,
        target: format!("http://{backend}").parse().expect("Invalid target"),
    }
}

/// Start the proxy over the given environments on an ephemeral port.
pub async fn start_proxy(
    environments: Vec<EnvironmentConfig>,
    env_store: Arc<EnvironmentStore>,
    log: Arc<TrafficLog>,
) -> SocketAddr {
    let config = ProxyConfig {
        environments,
        ..ProxyConfig::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind proxy listener");
    let addr = listener.local_addr().expect("Failed to get proxy address");

    let server = HttpServer::new(config, env_store, log).expect("Failed to build proxy");
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    addr
}
