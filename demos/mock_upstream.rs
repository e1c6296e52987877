//! A stand-in dev server for trying the relay locally.
//!
//! ```text
//! cargo run --example mock_upstream
//! cargo run -- --listen 8000 --upstream 127.0.0.1:3000
//! curl -i 'http://localhost:8000/api/widgets?id=5'
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::Query,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .route("/api/widgets", get(widgets))
        .route("/submit", post(submit));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!(address = %addr, "Mock upstream listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn widgets(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let id: u64 = params.get("id").and_then(|id| id.parse().ok()).unwrap_or(1);
    (
        [(header::CONTENT_TYPE, "application/json"), (header::SERVER, "mock-upstream")],
        format!("{{\"id\":{id}}}"),
    )
}

async fn submit(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], body)
}
