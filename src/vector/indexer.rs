// Incremental vector indexer: mutations enqueue operations per entity
// name, collapsing repeated create/update/delete into the latest intent,
// and flush either once a size threshold is hit or a time interval
// elapses (spec 4.5.4). Grounded on the teacher's `pending_writes`/
// `AUTO_FLUSH_THRESHOLD` counters in `vector_index.rs`, generalized from a
// single counter into a per-entity operation queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::vector::cache::EmbeddingCache;
use crate::vector::embeddings::EmbeddingProvider;
use crate::vector::store::VectorStore;

#[derive(Debug, Clone)]
enum PendingOp {
    Upsert { text: String },
    Delete,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexerConfig {
    pub flush_threshold: usize,
    pub flush_interval: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 50,
            flush_interval: Duration::from_secs(5),
        }
    }
}

pub struct VectorIndexer<P: EmbeddingProvider> {
    provider: Arc<P>,
    store: RwLock<VectorStore>,
    cache: Mutex<EmbeddingCache>,
    queue: Mutex<IndexMap<String, PendingOp>>,
    config: IndexerConfig,
    last_flush: Mutex<Instant>,
    shut_down: AtomicBool,
}

impl<P: EmbeddingProvider> VectorIndexer<P> {
    pub fn new(
        provider: Arc<P>,
        store: VectorStore,
        cache: EmbeddingCache,
        config: IndexerConfig,
    ) -> Self {
        Self {
            provider,
            store: RwLock::new(store),
            cache: Mutex::new(cache),
            queue: Mutex::new(IndexMap::new()),
            config,
            last_flush: Mutex::new(Instant::now()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Enqueues (or replaces the pending intent for) an upsert. Refuses
    /// after `shutdown()`.
    pub fn enqueue_upsert(&self, name: &str, document_text: String) -> Result<()> {
        self.check_not_shut_down()?;
        self.queue
            .lock()
            .insert(name.to_string(), PendingOp::Upsert { text: document_text });
        Ok(())
    }

    /// Enqueues (or replaces the pending intent for) a delete - a delete
    /// always wins over a still-pending upsert for the same name. Refuses
    /// after `shutdown()`.
    pub fn enqueue_delete(&self, name: &str) -> Result<()> {
        self.check_not_shut_down()?;
        self.queue.lock().insert(name.to_string(), PendingOp::Delete);
        Ok(())
    }

    /// Drops every pending operation without applying it.
    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn should_flush(&self) -> bool {
        self.pending_len() >= self.config.flush_threshold
            || self.last_flush.lock().elapsed() >= self.config.flush_interval
    }

    fn check_not_shut_down(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(GraphError::validation("vector indexer is shut down"));
        }
        Ok(())
    }

    /// Processes every pending operation: embeds (using the cache when
    /// the text hash is unchanged) and updates the vector store. Returns
    /// the number of operations applied.
    pub async fn flush(&self) -> Result<usize> {
        self.flush_with_progress(|_, _| {}).await
    }

    /// Like `flush`, but invokes `on_progress(completed, total)` after
    /// every applied operation, so a caller flushing a large queue can
    /// surface progress (spec 4.9).
    pub async fn flush_with_progress(&self, mut on_progress: impl FnMut(usize, usize)) -> Result<usize> {
        let pending: Vec<(String, PendingOp)> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        *self.last_flush.lock() = Instant::now();
        let total = pending.len();

        let mut applied = 0;
        for (name, op) in pending {
            match op {
                PendingOp::Delete => {
                    self.store.write().remove(&name);
                    self.cache.lock().invalidate_name(&name);
                    applied += 1;
                }
                PendingOp::Upsert { text } => {
                    let cached = self.cache.lock().get(&name, &text);
                    let vector = match cached {
                        Some(v) => v,
                        None => {
                            let embedded = self.provider.embed_text(&text).await?;
                            self.cache.lock().put(&name, &text, embedded.clone());
                            embedded
                        }
                    };
                    self.store.write().upsert(&name, vector)?;
                    applied += 1;
                }
            }
            on_progress(applied, total);
        }
        debug!(applied, "vector indexer flush complete");
        Ok(applied)
    }

    /// Flushes whatever is pending, then refuses any further enqueue.
    /// Idempotent - calling it again just flushes an already-empty queue.
    pub async fn shutdown(&self) -> Result<usize> {
        let applied = self.flush().await?;
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(applied)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &RwLock<VectorStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::embeddings::MockEmbeddingProvider;
    use crate::vector::store::VectorStoreConfig;

    fn indexer() -> VectorIndexer<MockEmbeddingProvider> {
        VectorIndexer::new(
            Arc::new(MockEmbeddingProvider::new(8)),
            VectorStore::new(VectorStoreConfig::default()),
            EmbeddingCache::new(16, Duration::from_secs(60)),
            IndexerConfig {
                flush_threshold: 2,
                flush_interval: Duration::from_secs(600),
            },
        )
    }

    #[tokio::test]
    async fn collapses_repeated_upserts_for_the_same_name() {
        let idx = indexer();
        idx.enqueue_upsert("Alice", "v1".to_string()).unwrap();
        idx.enqueue_upsert("Alice", "v2".to_string()).unwrap();
        assert_eq!(idx.pending_len(), 1);

        let applied = idx.flush().await.unwrap();
        assert_eq!(applied, 1);
        assert!(idx.store().read().contains("Alice"));
    }

    #[tokio::test]
    async fn delete_after_upsert_wins() {
        let idx = indexer();
        idx.enqueue_upsert("Alice", "v1".to_string()).unwrap();
        idx.enqueue_delete("Alice").unwrap();
        idx.flush().await.unwrap();
        assert!(!idx.store().read().contains("Alice"));
    }

    #[tokio::test]
    async fn should_flush_once_threshold_reached() {
        let idx = indexer();
        assert!(!idx.should_flush());
        idx.enqueue_upsert("A", "a".to_string()).unwrap();
        idx.enqueue_upsert("B", "b".to_string()).unwrap();
        assert!(idx.should_flush());
    }

    #[tokio::test]
    async fn clear_queue_drops_pending_operations() {
        let idx = indexer();
        idx.enqueue_upsert("A", "a".to_string()).unwrap();
        idx.clear_queue();
        assert_eq!(idx.pending_len(), 0);
    }

    #[tokio::test]
    async fn shutdown_flushes_then_refuses_further_enqueues() {
        let idx = indexer();
        idx.enqueue_upsert("Alice", "v1".to_string()).unwrap();

        let applied = idx.shutdown().await.unwrap();
        assert_eq!(applied, 1);
        assert!(idx.is_shut_down());
        assert!(idx.enqueue_upsert("Bob", "v1".to_string()).is_err());
    }

    #[tokio::test]
    async fn flush_with_progress_reports_each_completed_operation() {
        let idx = indexer();
        idx.enqueue_upsert("A", "a".to_string()).unwrap();
        idx.enqueue_upsert("B", "b".to_string()).unwrap();
        idx.enqueue_upsert("C", "c".to_string()).unwrap();

        let mut seen = Vec::new();
        idx.flush_with_progress(|done, total| seen.push((done, total))).await.unwrap();
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
