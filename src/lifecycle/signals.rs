//! OS signal handling.
//!
//! SIGINT/SIGTERM shut the gateway down; SIGHUP queues a reload.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::reload::ReloadQueue;

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Queue a reload on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    queue: ReloadQueue,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::warn!(error = %e, "SIGHUP reloads unavailable");
            return None;
        }
    };
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    let outcome = queue.trigger();
                    tracing::info!(?outcome, "SIGHUP received, reload queued");
                }
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(
    _queue: ReloadQueue,
    _shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    None
}
