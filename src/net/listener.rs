//! TCP listener implementation with optional backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address (fail fast)
//! - Accept incoming TCP connections
//! - Enforce `max_connections` via semaphore when configured

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address. Fatal at startup.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
}

/// A TCP listener that optionally limits concurrent connections.
///
/// With a cap configured, a semaphore permit is taken before each accept,
/// so new connections queue in the kernel backlog until a slot frees up.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: config.bind_address.clone(),
            source,
        };

        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            bind_error(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        tracing::info!(
            address = %local_addr,
            max_connections = ?config.max_connections,
            "Listener bound"
        );

        Ok(Self::from_tcp(listener, config.max_connections))
    }

    /// Wrap an already-bound listener.
    pub fn from_tcp(inner: TcpListener, max_connections: Option<usize>) -> Self {
        Self {
            inner,
            connection_limit: max_connections.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the
    /// connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure). The semaphore is never
        // closed, so acquisition cannot fail while `self` is alive.
        let permit = match &self.connection_limit {
            Some(limit) => limit.clone().acquire_owned().await.ok(),
            None => None,
        };

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::debug!(
            peer_addr = %addr,
            available_permits = ?self.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Current free connection slots, if a cap is configured.
    pub fn available_permits(&self) -> Option<usize> {
        self.connection_limit.as_ref().map(|s| s.available_permits())
    }
}

/// A connection slot. Released back to the listener when dropped, even if
/// the connection task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: Option<OwnedSemaphorePermit>,
}
