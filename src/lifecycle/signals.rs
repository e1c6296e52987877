//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and, on Unix, SIGTERM both mean graceful shutdown.

/// Resolve once the process is asked to stop.
///
/// If a handler cannot be installed the corresponding branch never
/// resolves; the error is logged and the other signal still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
    }
}
