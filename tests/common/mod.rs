//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use dev_relay::config::ProxyConfig;
use dev_relay::net::Listener;
use dev_relay::{HttpServer, Shutdown};

/// A relay running on an ephemeral port.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the relay in front of `upstream`, letting the caller adjust config.
pub async fn start_relay_with(
    upstream: SocketAddr,
    configure: impl FnOnce(&mut ProxyConfig),
) -> RunningRelay {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = upstream.to_string();
    config.timeouts.connect = Duration::from_secs(2);
    config.timeouts.response_header = Duration::from_secs(5);
    config.timeouts.shutdown_grace = Duration::from_secs(2);
    configure(&mut config);

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await;
    });

    RunningRelay { addr, shutdown, handle }
}

pub async fn start_relay(upstream: SocketAddr) -> RunningRelay {
    start_relay_with(upstream, |_| {}).await
}

/// A client that talks to the relay directly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Serve an axum router as the upstream.
pub async fn start_axum_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Upstream that echoes the request back.
///
/// - `GET /headers` answers with a JSON object of the received headers,
///   each name mapped to its list of values.
/// - Anything else answers 200 with the request body, the request's
///   content type, and `x-echo-method` / `x-echo-uri` headers.
pub async fn start_echo_upstream() -> SocketAddr {
    start_axum_upstream(Router::new().fallback(echo)).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    if uri.path() == "/headers" {
        let mut map = serde_json::Map::new();
        for name in headers.keys() {
            let values = headers
                .get_all(name)
                .iter()
                .map(|v| serde_json::Value::String(v.to_str().unwrap_or_default().to_string()))
                .collect();
            map.insert(name.as_str().to_string(), serde_json::Value::Array(values));
        }
        return (
            [(header::CONTENT_TYPE, "application/json")],
            serde_json::Value::Object(map).to_string(),
        )
            .into_response();
    }

    let mut response = Response::new(Body::from(body));
    let out = response.headers_mut();
    out.insert("x-echo-method", HeaderValue::from_str(method.as_str()).unwrap());
    out.insert("x-echo-uri", HeaderValue::from_str(&uri.to_string()).unwrap());
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        out.insert(header::CONTENT_TYPE, content_type.clone());
    }
    response
}

/// Read an HTTP request head (through the blank line) from a raw socket.
/// Returns `None` if the peer closes first.
pub async fn read_request_head(socket: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
    }
    Some(String::from_utf8_lossy(&head).into_owned())
}

/// Start a raw upstream: for each connection, read the request head and
/// hand the socket to `f`.
pub async fn start_raw_upstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(TcpStream, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = std::sync::Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        if let Some(head) = read_request_head(&mut socket).await {
                            f(socket, head).await;
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Raw upstream that answers every request with the same canned bytes.
pub async fn start_canned_upstream(response: &'static str) -> SocketAddr {
    start_raw_upstream(move |mut socket, _head| async move {
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    })
    .await
}
