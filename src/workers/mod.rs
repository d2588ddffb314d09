// Named, process-global worker pools for CPU-bound work (fuzzy matching,
// batch scoring) - spec section 5. Grounded on the teacher's dependence on
// `rayon` for parallel shards (`binary_relationship_bridge.rs`, now
// removed, used `par_iter` directly); this generalizes that into a
// registry of named pools with lazy init, shutdown, and per-pool task
// stats, in the style of the teacher's process-global `once_cell` +
// `dashmap` state elsewhere (e.g. `observability.rs`'s global metrics
// registry).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{GraphError, Result};

#[derive(Debug, Default)]
pub struct PoolStats {
    pub tasks_executed: AtomicU64,
    pub tasks_failed: AtomicU64,
}

impl PoolStats {
    pub fn record_task_execution(&self, failed: bool) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.tasks_executed.load(Ordering::Relaxed),
            self.tasks_failed.load(Ordering::Relaxed),
        )
    }
}

struct NamedPool {
    pool: ThreadPool,
    stats: PoolStats,
}

/// Process-wide registry of named worker pools. Lazily created on first
/// use; idempotent to shut down.
pub struct WorkerPoolManager {
    pools: DashMap<String, Arc<NamedPool>>,
}

static REGISTRY: Lazy<WorkerPoolManager> = Lazy::new(WorkerPoolManager::new);

impl WorkerPoolManager {
    fn new() -> Self {
        Self { pools: DashMap::new() }
    }

    pub fn global() -> &'static WorkerPoolManager {
        &REGISTRY
    }

    /// Returns the pool registered under `name`, creating it with
    /// `num_threads` (or the number of logical CPUs when `None`) workers
    /// if it doesn't exist yet.
    pub fn get_or_create(&self, name: &str, num_threads: Option<usize>) -> Result<WorkerPoolHandle> {
        if let Some(existing) = self.pools.get(name) {
            return Ok(WorkerPoolHandle {
                name: name.to_string(),
                inner: existing.clone(),
            });
        }

        let threads = num_threads.unwrap_or_else(num_cpus::get);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("kgraph-worker-{name}-{i}"))
            .build()
            .map_err(|e| GraphError::storage(format!("failed to build worker pool '{name}': {e}")))?;

        let named = Arc::new(NamedPool {
            pool,
            stats: PoolStats::default(),
        });
        self.pools.insert(name.to_string(), named.clone());

        Ok(WorkerPoolHandle {
            name: name.to_string(),
            inner: named,
        })
    }

    /// Drops a pool from the registry. Idempotent: shutting down a pool
    /// that isn't registered is not an error.
    pub fn shutdown(&self, name: &str) {
        self.pools.remove(name);
    }

    pub fn pool_names(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[derive(Clone)]
pub struct WorkerPoolHandle {
    name: String,
    inner: Arc<NamedPool>,
}

impl WorkerPoolHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_pool(&self) -> &ThreadPool {
        &self.inner.pool
    }

    pub fn run<F, R>(&self, work: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let result = self.inner.pool.install(work);
        self.inner.stats.record_task_execution(false);
        result
    }

    pub fn stats(&self) -> (u64, u64) {
        self.inner.stats.snapshot()
    }
}
