//! C1 — WorkerPool: owns the engine workers and places new conferences on them (§4.1).

use std::sync::Arc;
use std::time::Instant;

use mediasoup::router::{Router, RouterOptions};
use mediasoup::worker::{Worker, WorkerId, WorkerSettings};
use mediasoup::worker_manager::WorkerManager;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::CoreError;

struct WorkerEntry {
    worker: Worker,
    router_count: usize,
    last_used: Instant,
    cpu_score: f64,
    dead: bool,
}

pub struct WorkerPool {
    entries: Mutex<Vec<WorkerEntry>>,
    max_routers_per_worker: usize,
    /// Worker ids pushed by an `on_dead` hook and drained by [`PeriodicTasks`] so the registry
    /// can reconcile conferences pinned to the worker that just died.
    ///
    /// [`PeriodicTasks`]: crate::tasks::PeriodicTasks
    dead_workers: Mutex<Vec<WorkerId>>,
}

impl WorkerPool {
    /// Start `worker_count` engine workers (the caller passes `num_cpus::get()` or similar; the
    /// pool itself takes no opinion on CPU topology). Returns an `Arc` because each worker's
    /// `on_dead` hook needs to reach back into the pool.
    pub async fn new(
        worker_manager: &WorkerManager,
        worker_count: usize,
        config: &Config,
    ) -> anyhow::Result<Arc<Self>> {
        let mut entries = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let settings = build_worker_settings(config);
            let worker = worker_manager.create_worker(settings).await?;
            entries.push(WorkerEntry {
                worker,
                router_count: 0,
                last_used: Instant::now(),
                cpu_score: 0.0,
                dead: false,
            });
        }

        let pool = Arc::new(Self {
            entries: Mutex::new(entries),
            max_routers_per_worker: config.max_routers_per_worker,
            dead_workers: Mutex::new(Vec::new()),
        });

        let workers: Vec<Worker> = {
            let entries = pool.entries.lock().await;
            entries.iter().map(|entry| entry.worker.clone()).collect()
        };
        for worker in workers {
            let pool = pool.clone();
            let worker_id = worker.id();
            worker
                .on_dead(move |_| {
                    log::error!("worker {} died", worker_id);
                    let pool = pool.clone();
                    tokio::spawn(async move {
                        pool.mark_dead(worker_id).await;
                        pool.dead_workers.lock().await.push(worker_id);
                    });
                })
                .detach();
        }

        Ok(pool)
    }

    /// Drains and returns the ids of workers that died since the last drain. Called by
    /// [`PeriodicTasks`] each sweep tick to reconcile conferences pinned to them.
    ///
    /// [`PeriodicTasks`]: crate::tasks::PeriodicTasks
    pub async fn drain_dead_workers(&self) -> Vec<WorkerId> {
        let mut dead = self.dead_workers.lock().await;
        std::mem::take(&mut *dead)
    }

    /// Refresh `cpu_score` for every live worker from the engine's resource-usage counters.
    pub async fn refresh_stats(&self) {
        let mut entries = self.entries.lock().await;
        for entry in entries.iter_mut() {
            if entry.dead {
                continue;
            }
            match entry.worker.get_resource_usage().await {
                Ok(usage) => {
                    let cpu_seconds = usage.ru_utime.as_secs_f64() + usage.ru_stime.as_secs_f64();
                    entry.cpu_score = cpu_seconds;
                }
                Err(err) => {
                    log::warn!("failed to refresh worker stats: {}", err);
                }
            }
        }
    }

    /// Place a new conference: pick the least-loaded live worker, create a router on it, and
    /// return both. §4.1 steps 2–5. Takes `self` as an `Arc` so the router's `on_close` hook can
    /// reach back into the pool to decrement `router_count` without borrowing past its own
    /// lifetime.
    pub async fn place_conference(
        self: &Arc<Self>,
        router_options: RouterOptions,
    ) -> Result<(Worker, Router), CoreError> {
        let mut entries = self.entries.lock().await;

        let best_index = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.dead)
            .min_by(|(_, a), (_, b)| {
                score(a, self.max_routers_per_worker)
                    .partial_cmp(&score(b, self.max_routers_per_worker))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.last_used.cmp(&b.last_used))
            })
            .map(|(index, _)| index)
            .ok_or_else(|| CoreError::Fatal("no live workers available".to_string()))?;

        let worker = entries[best_index].worker.clone();
        let router = worker
            .create_router(router_options)
            .await
            .map_err(CoreError::engine)?;

        let pool = self.clone();
        let closed_worker = worker.clone();
        router
            .on_close(move || {
                let pool = pool.clone();
                let worker = closed_worker.clone();
                tokio::spawn(async move {
                    pool.decrement_router_count(&worker).await;
                });
            })
            .detach();

        entries[best_index].last_used = Instant::now();
        entries[best_index].router_count += 1;

        Ok((worker, router))
    }

    /// Decrement `router_count` for `worker`. Called from the router's `on_close` hook installed
    /// in [`Self::place_conference`].
    async fn decrement_router_count(&self, worker: &Worker) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.worker.id() == worker.id()) {
            entry.router_count = entry.router_count.saturating_sub(1);
        }
    }

    pub async fn mark_dead(&self, worker_id: WorkerId) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.worker.id() == worker_id) {
            entry.dead = true;
        }
    }

    pub async fn live_worker_count(&self) -> usize {
        self.entries.lock().await.iter().filter(|e| !e.dead).count()
    }
}

fn score(entry: &WorkerEntry, max_routers_per_worker: usize) -> f64 {
    score_of(entry.router_count, entry.cpu_score, max_routers_per_worker)
}

fn score_of(router_count: usize, cpu_score: f64, max_routers_per_worker: usize) -> f64 {
    let router_share = router_count as f64 / max_routers_per_worker.max(1) as f64;
    let cpu_share = (cpu_score / 100.0).min(1.0);
    0.6 * router_share + 0.4 * cpu_share
}

fn build_worker_settings(config: &Config) -> WorkerSettings {
    let mut settings = WorkerSettings::default();
    settings.log_level = config.worker_settings.log_level.into();
    settings.log_tags = config
        .worker_settings
        .log_tags
        .iter()
        .copied()
        .map(Into::into)
        .collect();
    settings.rtc_ports_range =
        config.worker_settings.rtc_min_port..=config.worker_settings.rtc_max_port;
    settings
}

#[cfg(test)]
mod tests {
    use super::score_of;

    #[test]
    fn score_weighs_router_count_and_cpu() {
        let idle = score_of(0, 0.0, 5);
        let busy_routers = score_of(5, 0.0, 5);
        let busy_cpu = score_of(0, 100.0, 5);
        assert_eq!(idle, 0.0);
        assert_eq!(busy_routers, 0.6);
        assert_eq!(busy_cpu, 0.4);
    }

    #[test]
    fn cpu_share_is_capped_at_one() {
        assert_eq!(score_of(0, 1000.0, 5), 0.4);
    }
}
