//! Header contract for both relay directions.
//!
//! Hop-by-hop headers describe a single transport connection and are never
//! forwarded. `Host` is rewritten to the upstream's authority on the way in;
//! headers that fingerprint the upstream's server software are dropped on
//! the way out.

use axum::http::{header, uri::Authority, HeaderMap, HeaderName, HeaderValue};

/// Headers that only apply to a single hop. Compared against lowercase
/// header names.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers that disclose the upstream's implementation.
pub const SERVER_IDENTITY_HEADERS: &[&str] = &[
    "server",
    "x-powered-by",
    "x-aspnet-version",
    "x-aspnetmvc-version",
];

/// Header names listed as tokens of any `Connection` header.
fn connection_nominated(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

/// Remove every hop-by-hop header, including those nominated by
/// `Connection`. Remaining headers keep their order and repetition.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let nominated = connection_nominated(headers);

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
    for name in &nominated {
        headers.remove(name);
    }
}

/// Prepare inbound headers for the upstream: drop hop-by-hop headers and
/// point `Host` at the upstream.
pub fn sanitize_request_headers(headers: &mut HeaderMap, host: &HeaderValue) {
    strip_hop_by_hop(headers);
    headers.remove(header::HOST);
    headers.insert(header::HOST, host.clone());
}

/// Prepare upstream headers for the client: drop hop-by-hop headers and
/// server banners.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    for name in SERVER_IDENTITY_HEADERS {
        headers.remove(*name);
    }
}

/// `Host` header value for an upstream authority.
pub fn host_header(authority: &Authority) -> Result<HeaderValue, header::InvalidHeaderValue> {
    HeaderValue::from_str(authority.as_str())
}
