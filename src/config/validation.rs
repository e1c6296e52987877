//! Semantic validation of a parsed configuration.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroConnectionCap,

    #[error("upstream: {0}")]
    Upstream(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, collecting every problem instead of stopping
/// at the first.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.listener.max_connections == Some(0) {
        errors.push(ValidationError::ZeroConnectionCap);
    }

    if let Err(reason) = config.upstream.authority() {
        errors.push(ValidationError::Upstream(reason));
    }

    if config.timeouts.connect.is_zero() {
        errors.push(ValidationError::ZeroTimeout("connect"));
    }
    if config.timeouts.response_header.is_zero() {
        errors.push(ValidationError::ZeroTimeout("response_header"));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ProxyConfig::default()), Ok(()));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.max_connections = Some(0);
        config.upstream.address = "localhost:0".into();
        config.timeouts.connect = Duration::ZERO;
        config.timeouts.response_header = Duration::ZERO;
        config.observability.metrics_address = Some("nope".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::ZeroTimeout("connect")));
        assert!(errors.contains(&ValidationError::ZeroConnectionCap));
    }

    #[test]
    fn zero_shutdown_grace_is_allowed() {
        let mut config = ProxyConfig::default();
        config.timeouts.shutdown_grace = Duration::ZERO;
        assert!(validate_config(&config).is_ok());
    }
}
