//! Graceful shutdown wiring.
//!
//! Shutdown runs in two phases. When `SIGINT` or `SIGTERM` arrives,
//! [`shutdown_signal`] broadcasts shutdown to the coordinator (every parked
//! `GET` is answered with `503`) and resolves, which makes the HTTP server stop
//! accepting connections and start draining. [`grace_expired`] then bounds how
//! long the drain may take before the process exits regardless.

use core::time::Duration;
use restq::Coordinator;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Resolves once a termination signal arrived and the coordinator was shut
/// down. Cancels `draining` so the grace period can start.
pub async fn shutdown_signal(coordinator: Coordinator, draining: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    begin_shutdown(&coordinator, &draining);
}

/// Releases every waiting consumer and starts the drain.
pub fn begin_shutdown(coordinator: &Coordinator, draining: &CancellationToken) {
    if coordinator.shutdown() {
        tracing::info!("Released all waiting consumers");
    }
    draining.cancel();
}

/// Resolves `grace` after `draining` was cancelled.
pub async fn grace_expired(draining: CancellationToken, grace: Duration) {
    draining.cancelled().await;
    tokio::time::sleep(grace).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn begin_shutdown_is_idempotent_and_starts_drain() {
        let coordinator = Coordinator::new();
        let draining = CancellationToken::new();

        begin_shutdown(&coordinator, &draining);
        begin_shutdown(&coordinator, &draining);

        assert!(coordinator.is_shut_down());
        assert!(draining.is_cancelled());
    }

    #[tokio::test]
    async fn grace_period_starts_only_after_drain_begins() {
        let draining = CancellationToken::new();
        let grace = Duration::from_millis(50);

        let pending = tokio::time::timeout(
            Duration::from_millis(100),
            grace_expired(draining.clone(), grace),
        )
        .await;
        assert!(pending.is_err());

        draining.cancel();
        let start = Instant::now();
        grace_expired(draining, grace).await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
