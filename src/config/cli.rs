//! Command-line surface.
//!
//! Only the listen address and the upstream address may also be supplied
//! through the environment.

use std::time::Duration;

use clap::Parser;

use crate::config::schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, TimeoutConfig, UpstreamConfig,
};

#[derive(Debug, Parser)]
#[command(name = "dev-relay")]
#[command(about = "Relay every HTTP request on a local port to one upstream dev server", long_about = None)]
pub struct Cli {
    /// Port (all interfaces) or host:port to listen on
    #[arg(short, long, env = "DEV_RELAY_LISTEN", default_value = "8000")]
    pub listen: String,

    /// Upstream host:port every request is forwarded to
    #[arg(short, long, env = "DEV_RELAY_UPSTREAM", default_value = "localhost:3000")]
    pub upstream: String,

    /// Upstream connect timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// Upstream response-header timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub response_timeout_ms: u64,

    /// Drain window for in-flight connections on shutdown, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub shutdown_grace_ms: u64,

    /// Cap on concurrent client connections (unbounded when omitted)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (pretty or json)
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,
}

impl Cli {
    /// Build the runtime configuration from parsed arguments.
    pub fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            listener: ListenerConfig {
                bind_address: normalize_listen(&self.listen),
                max_connections: self.max_connections,
            },
            upstream: UpstreamConfig {
                address: self.upstream,
            },
            timeouts: TimeoutConfig {
                connect: Duration::from_millis(self.connect_timeout_ms),
                response_header: Duration::from_millis(self.response_timeout_ms),
                shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            },
            observability: ObservabilityConfig {
                log_level: self.log_level,
                log_format: self.log_format,
                metrics_address: self.metrics_address,
            },
        }
    }
}

/// A bare port means every interface.
fn normalize_listen(listen: &str) -> String {
    let listen = listen.trim();
    if listen.parse::<u16>().is_ok() {
        format!("0.0.0.0:{}", listen)
    } else {
        listen.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_port_binds_all_interfaces() {
        let cli = Cli::parse_from(["dev-relay", "--listen", "9000"]);
        let config = cli.into_config();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn full_arguments() {
        let cli = Cli::parse_from([
            "dev-relay",
            "-l",
            "127.0.0.1:8080",
            "-u",
            "127.0.0.1:5173",
            "--connect-timeout-ms",
            "250",
            "--response-timeout-ms",
            "1500",
            "--max-connections",
            "64",
            "--log-format",
            "json",
        ]);
        let config = cli.into_config();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.listener.max_connections, Some(64));
        assert_eq!(config.upstream.address, "127.0.0.1:5173");
        assert_eq!(config.timeouts.connect, Duration::from_millis(250));
        assert_eq!(config.timeouts.response_header, Duration::from_millis(1500));
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["dev-relay", "--log-format", "xml"]).is_err());
    }
}
