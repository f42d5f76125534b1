//! Streaming HTTP forwarding.
//!
//! # Responsibilities
//! - Resolve the route and compute the backend URL
//! - Stream the request to the backend and the response back, teeing
//!   both bodies into the exchange record
//! - Rewrite identity headers (host/origin/referer/cookie) on the way
//!   out and CORS/cache headers on the way back
//! - Capture set-cookie responses into the environment's cookie jar
//!
//! # Design Decisions
//! - Side-effecting handler: failures become a 500/404 response plus a
//!   log line, never an error propagated to a caller
//! - The environment snapshot is taken once per exchange; a switch
//!   mid-request does not change that request's headers or target
//! - No retries: a dev proxy should show the failure, not mask it

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use crate::env::EnvSnapshot;
use crate::http::server::AppState;
use crate::routing::resolve;

/// Forward one browser request to the active environment's backend.
pub async fn forward(state: &AppState, env: EnvSnapshot, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let method = request.method().clone();

    let resolved = match resolve(&path, env.routes()) {
        Some(resolved) => resolved,
        None => {
            tracing::warn!(%path, environment = %env.name(), "No route matched");
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        }
    };

    let backend_url = match resolved.backend_url(query.as_deref()) {
        Ok(url) => url,
        Err(error) => {
            tracing::error!(%path, %error, "Failed to build backend URL");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid backend URL").into_response();
        }
    };

    tracing::debug!(
        method = %method,
        %path,
        backend = %backend_url,
        environment = %env.name(),
        "Forwarding request"
    );

    let record = state.log.log_fetch(
        method.as_str(),
        backend_url.as_str(),
        &path,
        query.as_deref(),
        header_pairs(request.headers()),
    );

    let browser_origin = request.headers().get(header::ORIGIN).cloned();
    let backend_headers = backend_request_headers(request.headers(), &env);
    let has_body = request_has_body(&method, request.headers());

    let mut backend_request = state
        .client
        .request(method, backend_url)
        .headers(backend_headers);

    backend_request = if has_body {
        let tee = record.clone();
        let body_stream = request.into_body().into_data_stream().map(move |chunk| {
            if let Ok(bytes) = &chunk {
                tee.request_body.append(bytes);
            }
            chunk
        });
        backend_request.body(reqwest::Body::wrap_stream(body_stream))
    } else {
        backend_request
    };

    let backend_response = match backend_request.send().await {
        Ok(response) => response,
        Err(error) => {
            tracing::error!(%error, "Backend request failed");
            record.set_response(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), Vec::new());
            return (StatusCode::INTERNAL_SERVER_ERROR, "Backend request failed").into_response();
        }
    };

    let status = backend_response.status();

    // A set-cookie response replaces the environment's jar wholesale.
    let set_cookies: Vec<String> = backend_response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect();
    if !set_cookies.is_empty() {
        state.env_store.set_cookies(set_cookies);
    }

    let headers = browser_response_headers(backend_response.headers(), browser_origin);
    record.set_response(status.as_u16(), header_pairs(&headers));

    let tee = record.clone();
    let body_stream = backend_response.bytes_stream().map(move |chunk| {
        if let Ok(bytes) = &chunk {
            tee.response_body.append(bytes);
        }
        chunk
    });

    // Status code only: HTTP/2 has no reason phrase, and reqwest does
    // not surface a non-standard one from HTTP/1 backends.
    let mut response = Response::new(Body::from_stream(body_stream));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Browser headers rewritten for the backend request.
///
/// All headers are forwarded except hop-by-hop framing, `host` (set from
/// the backend URL by the client), and the identity trio: `origin` and
/// `referer` become the environment origin, `cookie` comes from the jar.
fn backend_request_headers(browser: &HeaderMap, env: &EnvSnapshot) -> HeaderMap {
    let mut headers = browser.clone();
    for name in [
        header::HOST,
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
        header::ORIGIN,
        header::REFERER,
        header::COOKIE,
    ] {
        headers.remove(name);
    }

    let origin = env.origin().origin().ascii_serialization();
    if let Ok(value) = HeaderValue::from_str(&origin) {
        headers.insert(header::ORIGIN, value.clone());
        headers.insert(header::REFERER, value);
    }

    let cookies = env.cookies();
    if !cookies.is_empty() {
        match HeaderValue::from_str(&cookies.join("; ")) {
            Ok(value) => {
                headers.insert(header::COOKIE, value);
            }
            Err(error) => tracing::warn!(%error, "Cookie jar contains an unsendable value"),
        }
    }

    headers
}

/// Backend headers rewritten for the browser response.
fn browser_response_headers(backend: &HeaderMap, browser_origin: Option<HeaderValue>) -> HeaderMap {
    let mut headers = backend.clone();
    headers.remove(header::CONNECTION);
    headers.remove(header::TRANSFER_ENCODING);

    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    if let Some(origin) = browser_origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    headers
}

fn request_has_body(method: &Method, headers: &HeaderMap) -> bool {
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return true;
    }
    match headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
    {
        Some(length) => length > 0,
        // HTTP/2 uploads carry neither framing header; any method that
        // may have a body gets its stream forwarded.
        None => !matches!(*method, Method::GET | Method::HEAD),
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfig, RouteEntry, RouteKind};
    use crate::env::EnvironmentStore;

    fn snapshot(cookies: Vec<String>) -> EnvSnapshot {
        let store = EnvironmentStore::new(vec![EnvironmentConfig {
            name: "dev".to_string(),
            origin: "https://app.example.com".parse().unwrap(),
            routes: vec![RouteEntry {
                prefix: "/".to_string(),
                kind: RouteKind::Forward,
                target: "https://backend.example.com".parse().unwrap(),
            }],
        }]);
        store.set_cookies(cookies);
        store.active()
    }

    #[test]
    fn identity_headers_are_rewritten() {
        let mut browser = HeaderMap::new();
        browser.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        browser.insert(header::ORIGIN, HeaderValue::from_static("https://localhost"));
        browser.insert(header::COOKIE, HeaderValue::from_static("local=1"));
        browser.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let env = snapshot(vec!["sid=abc; Path=/".to_string(), "lang=en".to_string()]);
        let headers = backend_request_headers(&browser, &env);

        assert!(headers.get(header::HOST).is_none());
        assert_eq!(headers[header::ORIGIN], "https://app.example.com");
        assert_eq!(headers[header::REFERER], "https://app.example.com");
        assert_eq!(headers[header::COOKIE], "sid=abc; Path=/; lang=en");
        assert_eq!(headers[header::ACCEPT], "application/json");
    }

    #[test]
    fn empty_jar_sends_no_cookie_header() {
        let env = snapshot(Vec::new());
        let mut browser = HeaderMap::new();
        browser.insert(header::COOKIE, HeaderValue::from_static("local=1"));

        let headers = backend_request_headers(&browser, &env);
        assert!(headers.get(header::COOKIE).is_none());
    }

    #[test]
    fn cors_and_cache_headers_are_recomputed() {
        let mut backend = HeaderMap::new();
        backend.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        backend.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));

        let headers = browser_response_headers(
            &backend,
            Some(HeaderValue::from_static("https://localhost:8080")),
        );

        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://localhost:8080"
        );
        assert_eq!(headers[header::CONTENT_TYPE], "text/html");
    }

    #[test]
    fn absent_origin_leaves_allow_origin_unset() {
        let headers = browser_response_headers(&HeaderMap::new(), None);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn body_detection_follows_framing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert!(!request_has_body(&Method::POST, &headers));

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert!(request_has_body(&Method::POST, &headers));

        let mut chunked = HeaderMap::new();
        chunked.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert!(request_has_body(&Method::POST, &chunked));
    }

    #[test]
    fn unframed_uploads_are_forwarded_for_body_methods() {
        // HTTP/2 requests can stream a body with no content-length or
        // transfer-encoding header at all.
        let headers = HeaderMap::new();
        assert!(request_has_body(&Method::POST, &headers));
        assert!(request_has_body(&Method::PUT, &headers));
        assert!(!request_has_body(&Method::GET, &headers));
        assert!(!request_has_body(&Method::HEAD, &headers));
    }
}
