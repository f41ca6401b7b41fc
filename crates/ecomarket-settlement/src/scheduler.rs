//! Fixed-interval driver for [`PayoutEngine::sweep`].
//!
//! The sweep itself is synchronous and takes the store lock, so each tick
//! runs it on the blocking pool. Shutdown is cooperative: the signal is only
//! observed between ticks, so an in-flight sweep always completes.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::engine::PayoutEngine;

/// Handle to the background payout task.
pub struct PayoutScheduler {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    sweeps: Arc<AtomicU64>,
}

impl PayoutScheduler {
    /// Spawn the sweep loop on the current tokio runtime. The first sweep
    /// runs immediately.
    pub fn spawn(engine: Arc<PayoutEngine>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let sweeps = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sweeps);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
            tracing::info!(interval_ms, "payout scheduler started");

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let engine = Arc::clone(&engine);
                        match tokio::task::spawn_blocking(move || engine.sweep()).await {
                            Ok(Ok(report)) => {
                                counter.fetch_add(1, Ordering::Relaxed);
                                if !report.skipped.is_empty() {
                                    tracing::debug!(
                                        skipped = report.skipped.len(),
                                        "orders left for the next sweep"
                                    );
                                }
                            }
                            Ok(Err(e)) => tracing::error!(error = %e, "payout sweep failed"),
                            Err(e) => tracing::error!(error = %e, "payout sweep task panicked"),
                        }
                    }
                }
            }
            tracing::info!("payout scheduler stopped");
        });

        Self {
            shutdown_tx,
            handle,
            sweeps,
        }
    }

    /// Number of sweeps that completed without a store-level error.
    #[must_use]
    pub fn completed_sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "payout scheduler task failed");
        }
    }
}
