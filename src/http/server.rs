//! HTTP server setup and the per-connection accept loop.
//!
//! # Responsibilities
//! - Build the axum router that sends every request to the relay
//! - Accept connections and serve each on its own task
//! - Speak HTTP/1.1 and HTTP/2 (prior knowledge) to clients
//! - Drain connections on shutdown

use axum::{
    extract::{ConnectInfo, Request, State},
    response::Response,
    Extension, Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::http::error::ServerError;
use crate::http::relay::{relay, Upstream};
use crate::http::response::RelayContext;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionGuard, ConnectionId, ConnectionPermit, ConnectionTracker, Listener};

/// Pause after a failed accept so fd exhaustion does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Upstream,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let authority = config.upstream.authority().map_err(ServerError::InvalidUpstream)?;
        let upstream = Upstream::new(authority, &config.timeouts)
            .map_err(|e| ServerError::InvalidUpstream(e.to_string()))?;

        let router = Self::build_router(AppState { upstream });
        Ok(Self {
            router,
            config,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Every path and method goes to the relay; the router never answers
    /// on its own.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(relay_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the accept loop until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) {
        let mut shutdown_rx = shutdown.subscribe();

        match listener.local_addr() {
            Ok(addr) => tracing::info!(
                address = %addr,
                upstream = %self.config.upstream.address,
                "Relay accepting connections"
            ),
            Err(e) => tracing::warn!(error = %e, "Listener has no local address"),
        }

        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
                _ = shutdown_rx.recv() => break,
            };

            let guard = self.tracker.track();
            tokio::spawn(serve_connection(
                stream,
                peer,
                permit,
                guard,
                self.router.clone(),
                shutdown.subscribe(),
            ));
        }

        drop(listener);
        let live = self.tracker.active_count();
        tracing::info!(live_connections = live, "Stopped accepting, draining connections");

        let remaining = self.tracker.wait_for_drain(self.config.timeouts.shutdown_grace).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Shutdown grace elapsed with connections still open");
        }
        tracing::info!("HTTP server stopped");
    }
}

/// Serve one client connection until it closes or shutdown asks it to.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    guard: ConnectionGuard,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) {
    let connection_id = guard.id();
    let service = router.map_request(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request.extensions_mut().insert(connection_id);
        request
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.recv() => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };

    if let Err(e) = result {
        // Client resets and half-sent requests land here; they only
        // concern this connection.
        tracing::debug!(connection_id = %connection_id, peer_addr = %peer, error = %e, "Connection ended with error");
    }
}

/// Fallback handler: relay the request to the upstream.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(connection_id): Extension<ConnectionId>,
    request: Request,
) -> Response {
    let ctx = RelayContext::new(request.method(), request.uri().path());
    let span = ctx.span().clone();

    async move {
        tracing::debug!(
            peer_addr = %peer,
            connection_id = %connection_id,
            version = ?request.version(),
            "Request received"
        );
        relay(&state.upstream, ctx, request).await
    }
    .instrument(span)
    .await
}
