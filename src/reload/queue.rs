//! Single-slot reload queue and the loop that drains it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

/// What happened to a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A reload is now pending.
    Queued,
    /// One was already pending; this request folds into it.
    Coalesced,
    /// The reload loop has stopped.
    Closed,
}

/// Anything the reload loop can run.
#[async_trait]
pub trait Reload: Send + Sync {
    async fn reload(&self);
}

/// Cloneable handle for requesting reloads.
///
/// The channel holds at most one pending trigger. Triggers arriving while one
/// is pending are dropped.
#[derive(Clone)]
pub struct ReloadQueue {
    tx: mpsc::Sender<()>,
    progress: watch::Receiver<ReloadProgress>,
}

/// Receiving half, consumed by [`ReloadLoop`].
pub struct ReloadReceiver {
    rx: mpsc::Receiver<()>,
    progress: watch::Sender<ReloadProgress>,
}

/// Counters published by the reload loop. Reloads run in order, so reload
/// number `n` has finished once `finished >= n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadProgress {
    pub started: u64,
    pub finished: u64,
}

impl ReloadQueue {
    pub fn channel() -> (ReloadQueue, ReloadReceiver) {
        let (tx, rx) = mpsc::channel(1);
        let (progress_tx, progress_rx) = watch::channel(ReloadProgress::default());
        (
            ReloadQueue {
                tx,
                progress: progress_rx,
            },
            ReloadReceiver {
                rx,
                progress: progress_tx,
            },
        )
    }

    pub fn trigger(&self) -> ReloadOutcome {
        match self.tx.try_send(()) {
            Ok(()) => {
                tracing::debug!("Reload queued");
                ReloadOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::debug!("Reload already queued, coalescing");
                ReloadOutcome::Coalesced
            }
            Err(mpsc::error::TrySendError::Closed(())) => ReloadOutcome::Closed,
        }
    }

    /// Number of reloads finished so far.
    pub fn completed(&self) -> u64 {
        self.progress.borrow().finished
    }

    /// Queue a reload and wait until a reload that started after this call
    /// has finished.
    pub async fn trigger_and_wait(&self) -> ReloadOutcome {
        let mut progress = self.progress.clone();
        let target = progress.borrow_and_update().started + 1;
        let outcome = self.trigger();
        if outcome == ReloadOutcome::Closed {
            return outcome;
        }
        while progress.borrow_and_update().finished < target {
            if progress.changed().await.is_err() {
                return ReloadOutcome::Closed;
            }
        }
        outcome
    }
}

/// Runs reloads strictly one at a time with an idle gap after each.
pub struct ReloadLoop {
    receiver: ReloadReceiver,
    reloader: Arc<dyn Reload>,
    interval: Duration,
}

impl ReloadLoop {
    pub fn new(receiver: ReloadReceiver, reloader: Arc<dyn Reload>, interval: Duration) -> Self {
        Self {
            receiver,
            reloader,
            interval,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Reload loop started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                next = self.receiver.rx.recv() => {
                    if next.is_none() {
                        break;
                    }
                    self.receiver.progress.send_modify(|p| p.started += 1);
                    self.reloader.reload().await;
                    self.receiver.progress.send_modify(|p| p.finished += 1);

                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
            }
        }
        tracing::info!("Reload loop stopped");
    }
}
