//! Periodic eviction of idle cache entries.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::RequestCache;
use crate::worker::{BackgroundRunnable, BackgroundWorker};

/// Anything whose idle entries can be swept.
pub trait Sweep: Send + Sync + 'static {
    /// Evicts idle entries, returning how many were removed.
    fn sweep(&self) -> usize;
}

impl<T: Clone + Send + Sync + 'static> Sweep for RequestCache<T> {
    fn sweep(&self) -> usize {
        self.collect_garbage()
    }
}

/// Commands accepted by [`CacheGcWorker`].
#[derive(Debug)]
pub enum GcTask {
    /// Sweep every registered cache now.
    Sweep,
    /// Sweep now and report the number of evicted entries.
    SweepAndReport(oneshot::Sender<usize>),
}

/// Sweeps a set of caches on every tick.
#[derive(Default)]
pub struct CacheGcWorker {
    caches: Vec<Arc<dyn Sweep>>,
    evicted_total: u64,
}

impl CacheGcWorker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cache to the sweep set.
    #[must_use]
    pub fn watch(mut self, cache: impl Sweep) -> Self {
        self.caches.push(Arc::new(cache));
        self
    }

    /// Spawns the sweep loop, ticking every `interval_ms`.
    #[must_use]
    pub fn start(self, interval_ms: u64) -> BackgroundWorker<Self> {
        BackgroundWorker::start(self, interval_ms)
    }

    fn sweep_all(&mut self) -> usize {
        let evicted: usize = self.caches.iter().map(|c| c.sweep()).sum();
        self.evicted_total += evicted as u64;
        if evicted > 0 {
            debug!(evicted, total = self.evicted_total, "cache gc sweep");
        }
        evicted
    }
}

impl std::fmt::Debug for CacheGcWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGcWorker")
            .field("caches", &self.caches.len())
            .field("evicted_total", &self.evicted_total)
            .finish()
    }
}

#[async_trait]
impl BackgroundRunnable for CacheGcWorker {
    type Task = GcTask;

    async fn run(&mut self, task: GcTask) {
        match task {
            GcTask::Sweep => {
                self.sweep_all();
            }
            GcTask::SweepAndReport(reply) => {
                let evicted = self.sweep_all();
                let _ = reply.send(evicted);
            }
        }
    }

    async fn on_tick(&mut self) {
        self.sweep_all();
    }

    async fn shutdown(&mut self) {
        info!(evicted_total = self.evicted_total, "cache gc worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use crosspoint_core::{ManualClock, QueryDescriptor};

    use super::*;
    use crate::cache::QueryOptions;

    #[tokio::test]
    async fn on_demand_sweep_reports_evictions() {
        let clock = Arc::new(ManualClock::new(0));
        let games: RequestCache<u32> = RequestCache::new(clock.clone());
        let names: RequestCache<String> = RequestCache::new(clock.clone());
        games.set_value(&QueryDescriptor::new("a"), 1);
        games.set_value(&QueryDescriptor::new("b"), 2);
        names.set_value(&QueryDescriptor::new("c"), "x".to_string());
        let _pinned = names.subscribe(&QueryDescriptor::new("c"));

        let mut worker = CacheGcWorker::new()
            .watch(games.clone())
            .watch(names.clone())
            .start(60_000);
        clock.advance(QueryOptions::default().gc_ms);

        let (tx, rx) = oneshot::channel();
        worker.submit(GcTask::SweepAndReport(tx)).await.unwrap();
        assert_eq!(rx.await.unwrap(), 2);
        assert!(games.is_empty());
        assert_eq!(names.len(), 1);

        worker.stop().await;
    }
}
