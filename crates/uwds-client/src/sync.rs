//! Background outbound sync
//!
//! One [`SyncWorker`] per scene drains the scene's [`DirtySet`] and pushes
//! each node's current state to the authority.
//!
//! - Waits at most one poll interval per iteration, so a stop request is
//!   observed within that bound
//! - A failed push is logged and counted, never retried and never fatal
//!
//! [`DirtySet`]: crate::dirty::DirtySet

use crate::cache::NodeCache;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Sync worker statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Successful pushes
    pub pushed: u64,
    /// Pushes that failed and were dropped
    pub failed: u64,
}

/// Live counters shared between a worker and its scene
#[derive(Debug, Default)]
pub struct SyncCounters {
    pushed: AtomicU64,
    failed: AtomicU64,
}

impl SyncCounters {
    /// Current values
    #[must_use]
    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running sync task
#[derive(Debug)]
pub struct SyncWorker {
    stop: Arc<AtomicBool>,
    counters: Arc<SyncCounters>,
    handle: Option<JoinHandle<()>>,
}

impl SyncWorker {
    /// Spawn a worker draining `cache` onto the current runtime
    #[must_use]
    pub fn spawn(cache: Arc<NodeCache>, interval: Duration) -> Self {
        Self::spawn_with(cache, interval, Arc::new(SyncCounters::default()))
    }

    /// Spawn a worker reporting into existing counters
    #[must_use]
    pub fn spawn_with(
        cache: Arc<NodeCache>,
        interval: Duration,
        counters: Arc<SyncCounters>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(sync_loop(
            cache,
            interval,
            Arc::clone(&stop),
            Arc::clone(&counters),
        ));

        Self {
            stop,
            counters,
            handle: Some(handle),
        }
    }

    /// Get worker statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    /// Shared counters
    #[inline]
    #[must_use]
    pub fn counters(&self) -> &Arc<SyncCounters> {
        &self.counters
    }

    /// True until the task has exited
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request a stop and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Sync worker ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn sync_loop(
    cache: Arc<NodeCache>,
    interval: Duration,
    stop: Arc<AtomicBool>,
    counters: Arc<SyncCounters>,
) {
    tracing::debug!("Sync worker started for world {}", cache.world());

    while !stop.load(Ordering::Acquire) {
        let Ok(id) = cache.dirty().pop_timeout(interval).await else {
            continue;
        };

        match cache.push(&id).await {
            Ok(()) => {
                counters.pushed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Pushed node {} to world {}", id, cache.world());
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Failed to push node {} to world {}: {}",
                    id,
                    cache.world(),
                    e
                );
            }
        }
    }

    tracing::debug!("Sync worker stopped for world {}", cache.world());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use uwds_authority::MemoryAuthority;
    use uwds_proto::{Authority, WorldScope};

    async fn setup() -> (Arc<MemoryAuthority>, Arc<NodeCache>) {
        let authority = Arc::new(MemoryAuthority::new());
        let client = authority.handshake("sync tests").await.unwrap();
        let cache = Arc::new(NodeCache::new(
            Arc::clone(&authority) as Arc<dyn Authority>,
            WorldScope::new(client, "base"),
        ));
        (authority, cache)
    }

    async fn settle(worker: &SyncWorker, expected: SyncStats) {
        for _ in 0..200 {
            if worker.stats() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("worker stats {:?} never reached {:?}", worker.stats(), expected);
    }

    #[tokio::test]
    async fn pushes_dirty_nodes() {
        let (authority, cache) = setup().await;
        let worker = SyncWorker::spawn(Arc::clone(&cache), Duration::from_millis(5));

        let node = cache.insert_local(Node::new());
        node.set_name("lamp").unwrap();

        settle(&worker, SyncStats { pushed: 1, failed: 0 }).await;
        let remote = authority.node("base", node.id()).unwrap();
        assert_eq!(remote.name, "lamp");
        assert!(!node.is_locally_dirty().unwrap());

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn failed_push_is_counted_and_dropped() {
        let (authority, cache) = setup().await;
        authority.set_online(false);
        let worker = SyncWorker::spawn(Arc::clone(&cache), Duration::from_millis(5));

        let node = cache.insert_local(Node::new());
        settle(&worker, SyncStats { pushed: 0, failed: 1 }).await;

        assert!(cache.dirty().is_empty());
        assert!(node.is_locally_dirty().unwrap());
        assert!(worker.is_running());

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_task() {
        let (_authority, cache) = setup().await;
        let worker = SyncWorker::spawn(Arc::clone(&cache), Duration::from_millis(5));
        assert!(worker.is_running());

        tokio::time::timeout(Duration::from_secs(1), worker.shutdown())
            .await
            .unwrap();

        cache.insert_local(Node::new());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.dirty().len(), 1);
    }
}
