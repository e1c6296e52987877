//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! Every field has a default matching the classic two-dev-server setup:
//! listen on port 8000, forward to the app on `localhost:3000`.

use std::time::Duration;

use axum::http::uri::Authority;

/// Root configuration for the relay.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// The single upstream every request is relayed to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum concurrent client connections. `None` leaves the relay
    /// bounded only by system limits.
    pub max_connections: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_connections: None,
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Upstream authority as `host:port` (e.g., "localhost:3000").
    pub address: String,
}

impl UpstreamConfig {
    /// Parse the configured address into a URI authority.
    ///
    /// Accepts an optional `http://` prefix and a trailing `/`. A missing
    /// port means port 80.
    pub fn authority(&self) -> Result<Authority, String> {
        let raw = self.address.trim();
        let raw = raw.strip_prefix("http://").unwrap_or(raw);
        let raw = raw.strip_suffix('/').unwrap_or(raw);

        let authority: Authority = raw
            .parse()
            .map_err(|e| format!("invalid upstream address {:?}: {}", self.address, e))?;

        if authority.as_str().contains('@') {
            return Err(format!(
                "upstream address {:?} must not carry credentials",
                self.address
            ));
        }

        match authority.port_u16() {
            Some(0) => Err(format!("upstream address {:?} has port 0", self.address)),
            Some(_) => Ok(authority),
            None if authority.as_str() != authority.host() => Err(format!(
                "upstream address {:?} has an invalid port",
                self.address
            )),
            None => format!("{}:80", authority.host())
                .parse()
                .map_err(|e| format!("invalid upstream address {:?}: {}", self.address, e)),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "localhost:3000".to_string(),
        }
    }
}

/// Timeout configuration for upstream calls and shutdown.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout.
    pub connect: Duration,

    /// Bound on the wait for the upstream's response head, measured from
    /// dispatch (includes connecting).
    pub response_header: Duration,

    /// How long in-flight connections may drain after a shutdown signal.
    pub shutdown_grace: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            response_header: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {:?} (expected pretty or json)", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus exporter bind address; no exporter when `None`.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dev_setup() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8000");
        assert_eq!(config.upstream.address, "localhost:3000");
        assert!(config.listener.max_connections.is_none());
        assert!(config.observability.metrics_address.is_none());
    }

    #[test]
    fn authority_accepts_host_port() {
        let upstream = UpstreamConfig { address: "127.0.0.1:3000".into() };
        assert_eq!(upstream.authority().unwrap().as_str(), "127.0.0.1:3000");
    }

    #[test]
    fn authority_strips_scheme_and_defaults_port() {
        let upstream = UpstreamConfig { address: "http://backend.local/".into() };
        let authority = upstream.authority().unwrap();
        assert_eq!(authority.host(), "backend.local");
        assert_eq!(authority.port_u16(), Some(80));
    }

    #[test]
    fn authority_rejects_garbage() {
        assert!(UpstreamConfig { address: "no spaces allowed:1".into() }.authority().is_err());
        assert!(UpstreamConfig { address: "localhost:0".into() }.authority().is_err());
        assert!(UpstreamConfig { address: "user:pw@localhost:3000".into() }.authority().is_err());
        assert!(UpstreamConfig { address: "localhost:3000/api".into() }.authority().is_err());
        assert!(UpstreamConfig { address: "localhost:99999".into() }.authority().is_err());
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
