//! Background task that periodically sweeps a bucket store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::store::BucketStore;

/// Handle to a running sweeper.
///
/// Dropping the handle cancels the task without waiting for it.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Token that stops the sweeper when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweeper task did not exit cleanly");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn a task sweeping `store` every `every`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sweeper(store: Arc<dyn BucketStore>, every: Duration) -> SweeperHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_sweep_loop(store, every, cancel.clone()));

    SweeperHandle {
        cancel,
        task: Some(task),
    }
}

async fn run_sweep_loop(store: Arc<dyn BucketStore>, every: Duration, cancel: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; nothing can be idle yet.
    ticker.tick().await;

    info!(
        interval_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX),
        "Bucket sweeper started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Bucket sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = store.sweep();
                debug!(removed, remaining = store.len(), "Sweep pass completed");
            }
        }
    }
}
