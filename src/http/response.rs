//! Response relay and the per-request lifecycle.
//!
//! # Request States
//! ```text
//! Received → Forwarding → AwaitingUpstream → Streaming → Completed
//!                 │               │              │
//!                 └───────────────┴──────────────┴──→ Failed
//! ```
//! `Completed` and `Failed` are terminal. There is no retry arc.
//!
//! The upstream body is handed to the client connection frame by frame as
//! it arrives. If the client goes away, the wrapper is dropped together
//! with the upstream body, which closes the upstream connection.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, StatusCode, Version},
    response::{IntoResponse, Response},
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use hyper::body::Incoming;
use uuid::Uuid;

use crate::http::error::RelayError;
use crate::http::headers::sanitize_response_headers;
use crate::observability::metrics;

/// Lifecycle phase of one relayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    /// Inbound request head parsed.
    Received,
    /// Outbound request being constructed and dispatched.
    Forwarding,
    /// Waiting for the upstream's response head.
    AwaitingUpstream,
    /// Upstream body flowing to the client.
    Streaming,
    /// Whole response delivered.
    Completed,
    /// Ended by an error or a client disconnect.
    Failed,
}

impl RelayPhase {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: RelayPhase) -> bool {
        use RelayPhase::*;
        matches!(
            (self, next),
            (Received, Forwarding)
                | (Forwarding, AwaitingUpstream)
                | (AwaitingUpstream, Streaming)
                | (Streaming, Completed)
                | (Forwarding, Failed)
                | (AwaitingUpstream, Failed)
                | (Streaming, Failed)
        )
    }

    /// Whether the request has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayPhase::Completed | RelayPhase::Failed)
    }
}

/// Per-request state owned by the task handling it.
#[derive(Debug)]
pub struct RelayContext {
    method: Method,
    started: Instant,
    phase: RelayPhase,
    span: tracing::Span,
}

impl RelayContext {
    /// Start tracking a freshly received request.
    pub fn new(method: &Method, path: &str) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("relay", relay_id = %id, method = %method, path = %path);
        Self {
            method: method.clone(),
            started: Instant::now(),
            phase: RelayPhase::Received,
            span,
        }
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    /// Span that all events of this request belong to.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: RelayPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            self.span.in_scope(|| {
                tracing::error!(from = ?self.phase, to = ?next, "Illegal relay phase transition")
            });
            return false;
        }
        self.span
            .in_scope(|| tracing::debug!(from = ?self.phase, to = ?next, "Relay phase"));
        self.phase = next;
        true
    }

    /// End the request with `error` and produce the client-facing response.
    ///
    /// A client disconnect is logged at debug level and counted on its own;
    /// it carries no status because nobody is left to receive one.
    pub fn fail(mut self, error: RelayError) -> Response {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.advance(RelayPhase::Failed);

        match error.status() {
            Some(status) => {
                self.span.in_scope(|| {
                    tracing::warn!(error = %error, status = status.as_u16(), elapsed_ms, "Relay failed")
                });
                metrics::record_request(self.method.as_str(), status.as_u16(), error.outcome(), self.started);
            }
            None => {
                self.span.in_scope(|| {
                    tracing::debug!(error = %error, elapsed_ms, "Client went away, upstream request cancelled")
                });
                metrics::record_client_disconnect(self.method.as_str(), self.started);
            }
        }

        error.into_response()
    }
}

/// Turn the upstream response into the client response.
///
/// Status and reason phrase (carried in the response extensions) are kept;
/// headers follow the response-side contract; the body streams.
pub fn relay_response(upstream: Response<Incoming>, ctx: RelayContext) -> Response {
    let (mut parts, body) = upstream.into_parts();
    sanitize_response_headers(&mut parts.headers);
    parts.version = Version::HTTP_11;

    ctx.span.in_scope(|| {
        tracing::debug!(status = parts.status.as_u16(), "Upstream responded, streaming body")
    });

    let body = RelayBody::new(body, ctx, parts.status);
    Response::from_parts(parts, Body::new(body))
}

/// Upstream body wrapper that closes out the request lifecycle.
///
/// Frames pass through untouched. The lifecycle ends `Completed` when the
/// body reaches its end, `Failed` when the upstream body errors, and
/// `Failed` (client disconnect) when dropped before the end.
pub struct RelayBody<B: HttpBody> {
    inner: B,
    ctx: RelayContext,
    status: StatusCode,
}

impl<B: HttpBody> RelayBody<B> {
    pub fn new(inner: B, ctx: RelayContext, status: StatusCode) -> Self {
        Self { inner, ctx, status }
    }

    fn elapsed_ms(&self) -> u64 {
        self.ctx.started.elapsed().as_millis() as u64
    }

    fn complete(&mut self) {
        if !self.ctx.advance(RelayPhase::Completed) {
            return;
        }
        let (status, elapsed_ms) = (self.status.as_u16(), self.elapsed_ms());
        self.ctx
            .span
            .in_scope(|| tracing::info!(status, elapsed_ms, "Request completed"));
        metrics::record_request(self.ctx.method.as_str(), status, "completed", self.ctx.started);
    }

    fn upstream_failed(&mut self, error: &dyn std::fmt::Display) {
        if !self.ctx.advance(RelayPhase::Failed) {
            return;
        }
        let (status, elapsed_ms) = (self.status.as_u16(), self.elapsed_ms());
        self.ctx.span.in_scope(|| {
            tracing::warn!(status, elapsed_ms, error = %error, "Upstream body failed mid-stream")
        });
        metrics::record_request(self.ctx.method.as_str(), status, "upstream_body_error", self.ctx.started);
    }

    fn client_disconnected(&mut self) {
        if !self.ctx.advance(RelayPhase::Failed) {
            return;
        }
        let (upstream_status, elapsed_ms) = (self.status.as_u16(), self.elapsed_ms());
        self.ctx.span.in_scope(|| {
            tracing::debug!(upstream_status, elapsed_ms, "Client disconnected mid-stream, upstream request cancelled")
        });
        metrics::record_client_disconnect(self.ctx.method.as_str(), self.ctx.started);
    }
}

impl<B> HttpBody for RelayBody<B>
where
    B: HttpBody + Unpin,
    B::Error: std::fmt::Display,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.upstream_failed(&e);
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: HttpBody> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if self.ctx.phase.is_terminal() {
            return;
        }
        // The connection may stop polling once the body reports its end
        // (empty bodies, HEAD, exhausted Content-Length).
        if self.inner.is_end_stream() {
            self.complete();
        } else {
            self.client_disconnected();
        }
    }
}
