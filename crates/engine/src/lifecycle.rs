use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::scanner::Scanner;

/// Cloneable handle used to stop the engine from another task.
#[derive(Clone)]
pub struct EngineHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl EngineHandle {
    /// Request a stop. The engine finishes the tick in progress first.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop once `signal` fires. If the signal cannot be listened for, this
    /// handle is dropped without stopping; other handles keep the engine
    /// running.
    pub async fn stop_on<F>(self, signal: F)
    where
        F: Future<Output = std::io::Result<()>>,
    {
        match signal.await {
            Ok(()) => {
                info!("Shutdown signal received, stopping after the current tick");
                self.stop();
            }
            Err(e) => warn!(error = %e, "Could not listen for shutdown signal"),
        }
    }
}

/// Drives the scanner: one tick immediately, then one every `interval`.
pub struct Engine {
    scanner: Scanner,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(scanner: Scanner, interval: Duration) -> (Self, EngineHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine {
            scanner,
            interval,
            shutdown_rx,
        };
        (engine, EngineHandle { shutdown_tx })
    }

    /// Run until stopped. Dropping every handle also stops the engine.
    /// Ticks run to completion; a stop request is only seen between ticks.
    /// Returns the number of ticks run.
    pub async fn run(mut self) -> u64 {
        info!(interval = ?self.interval, "Engine started");
        self.scanner.announce_start().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let summary = self.scanner.run_all_checks().await;
            ticks += 1;
            if summary.skipped_no_data == summary.groups && summary.groups > 0 {
                warn!(groups = summary.groups, "No market data for any group this tick");
            }
        }

        info!(ticks, "Engine stopped");
        ticks
    }
}
