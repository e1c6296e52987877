//! Relay error taxonomy and the responses synthesized for it.
//!
//! Only two statuses are ever produced by the relay itself: 502 when the
//! upstream cannot be reached in time, 500 for everything else. Bodies are
//! short plain text built from our own error descriptions, never from
//! upstream payloads.

use std::error::Error as StdError;
use std::net::AddrParseError;
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::BuildError;
use tracing_subscriber::util::TryInitError;

use crate::net::ListenerError;

/// Failure of a single relayed request. Never outlives the request.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Connection refused, name resolution failed, or the request could
    /// not be written to the upstream.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Connect or response-head wait exceeded its configured bound.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    /// The client stopped sending its request body.
    #[error("client aborted the request: {0}")]
    ClientDisconnect(String),

    /// Anything else, e.g. an outbound request that cannot be constructed or
    /// an upstream response that cannot be parsed.
    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    /// Status code reported to the client. `None` when there is no client
    /// left to report to.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RelayError::UpstreamUnreachable(_) | RelayError::UpstreamTimeout(_) => {
                Some(StatusCode::BAD_GATEWAY)
            }
            RelayError::Internal(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            RelayError::ClientDisconnect(_) => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::UpstreamUnreachable(_) => "upstream_unreachable",
            RelayError::UpstreamTimeout(_) => "upstream_timeout",
            RelayError::ClientDisconnect(_) => "client_disconnect",
            RelayError::Internal(_) => "internal_error",
        }
    }

    /// Classify an error from the upstream client.
    ///
    /// The error chain is inspected from the outside in: an io timeout
    /// anywhere wins, then the first hyper error decides between a client
    /// body failure, an upstream connection failure and a protocol error.
    /// `connect_timeout` is reported for io timeouts, which only the
    /// connector raises.
    pub fn from_upstream(err: hyper_util::client::legacy::Error, connect_timeout: Duration) -> Self {
        if chain(&err).any(|e| {
            e.downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
        }) {
            return RelayError::UpstreamTimeout(connect_timeout);
        }

        let reason = describe(&err);

        if err.is_connect() {
            return RelayError::UpstreamUnreachable(reason);
        }

        match chain(&err).find_map(|e| e.downcast_ref::<hyper::Error>()) {
            Some(hyper_err) if hyper_err.is_user() => RelayError::ClientDisconnect(reason),
            Some(hyper_err) if hyper_err.is_parse() || hyper_err.is_parse_status() => {
                RelayError::Internal(format!("invalid response from upstream: {reason}"))
            }
            Some(_) => RelayError::UpstreamUnreachable(reason),
            None if chain(&err).any(|e| e.is::<std::io::Error>()) => {
                RelayError::UpstreamUnreachable(reason)
            }
            None => RelayError::Internal(reason),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let Some(status) = self.status() else {
            // Connection is already gone; hyper discards whatever we return.
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        let label = status.canonical_reason().unwrap_or("Error");
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{label}: {self}\n"),
        )
            .into_response()
    }
}

/// `err` followed by each of its sources.
fn chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// Outer message joined with the innermost cause, e.g.
/// `client error (Connect): Connection refused (os error 111)`.
fn describe(err: &(dyn StdError + 'static)) -> String {
    match chain(err).last() {
        Some(root) if !std::ptr::addr_eq(root, err) => format!("{err}: {root}"),
        _ => err.to_string(),
    }
}

/// Startup failures. Any of these ends the process with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot install log subscriber: {0}")]
    Logging(#[from] TryInitError),

    #[error("{0} configuration error(s)")]
    InvalidConfig(usize),

    #[error("invalid upstream: {0}")]
    InvalidUpstream(String),

    #[error("invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("cannot start metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn gateway_failures_map_to_502() {
        assert_eq!(
            RelayError::UpstreamUnreachable("refused".into()).status(),
            Some(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(
            RelayError::UpstreamTimeout(Duration::from_secs(1)).status(),
            Some(StatusCode::BAD_GATEWAY)
        );
        assert_eq!(
            RelayError::Internal("bad header".into()).status(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn client_disconnect_has_no_reported_status() {
        let error = RelayError::ClientDisconnect("connection reset".into());
        assert_eq!(error.status(), None);
        assert_eq!(error.outcome(), "client_disconnect");
    }

    #[tokio::test]
    async fn error_body_is_human_readable() {
        let response = RelayError::UpstreamUnreachable("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Bad Gateway: upstream unreachable: connection refused\n");
    }

    #[tokio::test]
    async fn internal_error_body_names_the_failure() {
        let response = RelayError::Internal("invalid response from upstream".into()).into_response();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(
            &body[..],
            b"Internal Server Error: invalid response from upstream\n"
        );
    }

    #[test]
    fn describe_includes_root_cause() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = ServerError::Listener(ListenerError::Accept(inner));
        assert_eq!(describe(&outer), "failed to accept connection: refused: refused");
    }

    #[test]
    fn startup_errors_name_the_cause() {
        assert_eq!(ServerError::InvalidConfig(2).to_string(), "2 configuration error(s)");

        let parse_err = "not-an-address".parse::<std::net::SocketAddr>().unwrap_err();
        let err = ServerError::from(parse_err);
        assert!(err.to_string().starts_with("invalid metrics address: "), "{err}");
    }
}
