//! C8 — PeriodicTasks: a single recurring timer driving housekeeping (§4.7).
//!
//! Grounded on the recurring `tokio::spawn` + interval idiom used across the pack's server
//! `main` functions (e.g. `quyphuc2111-mediasoup_webrtc`'s manager setup loop), generalized here
//! into a standalone timer that the boot sequence starts and stops explicitly.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::registry::Registry;
use crate::worker_pool::WorkerPool;

pub struct PeriodicTasks {
    handle: JoinHandle<()>,
}

impl PeriodicTasks {
    pub fn start(worker_pool: Arc<WorkerPool>, registry: Arc<Registry>, interval_ms: u64) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                worker_pool.refresh_stats().await;
                registry.sweep().await;
                for worker_id in worker_pool.drain_dead_workers().await {
                    registry.reconcile_dead_worker(worker_id).await;
                }
            }
        });
        Self { handle }
    }

    /// Aborts the timer task. Called before other resources are torn down on shutdown (§4.7).
    pub fn stop(self) {
        self.handle.abort();
    }
}
