//! Request relay: turn an inbound request into the upstream request.
//!
//! # Responsibilities
//! - Rebuild the request against the fixed upstream (path and query verbatim)
//! - Apply the request-side header contract
//! - Stream the body through without buffering
//! - Send it with a bounded wait for the response head
//! - Classify failures into the relay error taxonomy
//!
//! # Design Decisions
//! - One attempt per inbound request; no retries
//! - No idle pooling: every relayed request gets its own upstream connection
//! - Dropping the in-flight future cancels the upstream exchange

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, Uri, Version,
    },
    response::Response,
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::oneshot;

use crate::config::TimeoutConfig;
use crate::http::error::RelayError;
use crate::http::headers::{host_header, sanitize_request_headers};
use crate::http::response::{relay_response, RelayContext, RelayPhase};

/// HTTP client used toward the upstream.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// The fixed upstream origin plus the client that reaches it.
///
/// Holds no per-request state; cloning is cheap and shares the client.
#[derive(Clone)]
pub struct Upstream {
    client: UpstreamClient,
    authority: Authority,
    host: HeaderValue,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl Upstream {
    /// Build the upstream handle for `authority`.
    pub fn new(authority: Authority, timeouts: &TimeoutConfig) -> Result<Self, RelayError> {
        let host = host_header(&authority)
            .map_err(|e| RelayError::Internal(format!("invalid upstream host header: {e}")))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        Ok(Self {
            client,
            authority,
            host,
            connect_timeout: timeouts.connect,
            response_timeout: timeouts.response_header,
        })
    }

    /// The upstream authority (`host:port`).
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Rebuild `request` for the upstream.
    ///
    /// Method, path, query and body pass through untouched. Headers follow
    /// the request-side contract. The upstream always sees HTTP/1.1.
    pub fn build_request(&self, request: Request) -> Result<Request, RelayError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        parts.uri = Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| RelayError::Internal(format!("cannot build upstream URI: {e}")))?;

        parts.version = Version::HTTP_11;
        sanitize_request_headers(&mut parts.headers, &self.host);

        Ok(Request::from_parts(parts, body))
    }

    /// Send a prepared request and wait, bounded, for the response head.
    ///
    /// Connecting is bounded by the connector. The response-head clock
    /// starts once the request body has been handed to the upstream in
    /// full, so a slow upload to a healthy upstream is not cut off.
    pub async fn send(&self, request: Request) -> Result<Response<Incoming>, RelayError> {
        let (parts, body) = request.into_parts();
        let (body, body_sent) = OutboundBody::new(body);
        let request = Request::from_parts(parts, Body::new(body));

        let head_deadline = async {
            // Resolves on end of body, or when the client drops the body.
            let _ = body_sent.await;
            tokio::time::sleep(self.response_timeout).await;
        };

        tokio::select! {
            result = self.client.request(request) => {
                result.map_err(|e| RelayError::from_upstream(e, self.connect_timeout))
            }
            () = head_deadline => Err(RelayError::UpstreamTimeout(self.response_timeout)),
        }
    }
}

/// Request body wrapper that reports when the body has been sent in full.
///
/// The signal fires when the inner body ends, errors, or is dropped by the
/// client connection.
struct OutboundBody {
    inner: Body,
    sent: Option<oneshot::Sender<()>>,
}

impl OutboundBody {
    fn new(inner: Body) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { inner, sent: Some(tx) }, rx)
    }

    fn mark_sent(&mut self) {
        if let Some(tx) = self.sent.take() {
            let _ = tx.send(());
        }
    }
}

impl HttpBody for OutboundBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => this.mark_sent(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.mark_sent(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Relay one inbound request to the upstream and produce the client response.
///
/// Every outcome, including failures, becomes a response here; nothing
/// escapes to sibling requests.
pub async fn relay(upstream: &Upstream, mut ctx: RelayContext, request: Request) -> Response {
    ctx.advance(RelayPhase::Forwarding);
    let outbound = match upstream.build_request(request) {
        Ok(outbound) => outbound,
        Err(e) => return ctx.fail(e),
    };

    ctx.advance(RelayPhase::AwaitingUpstream);
    let response = match upstream.send(outbound).await {
        Ok(response) => response,
        Err(e) => return ctx.fail(e),
    };

    ctx.advance(RelayPhase::Streaming);
    relay_response(response, ctx)
}
