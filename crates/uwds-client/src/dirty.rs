//! Nodes pending outbound sync
//!
//! [`DirtySet`] is the mailbox between foreground mutators and the sync
//! worker. It stores ids only: the worker resolves the current node state
//! from the cache when it drains, so an id enqueued twice is pushed once
//! with its latest state.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::Notify;
use uwds_proto::NodeId;

/// Returned when no dirty node showed up in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out waiting for a dirty node")]
pub struct PopTimeout;

/// Deduplicating set of dirty node ids with async wait
#[derive(Debug, Default)]
pub struct DirtySet {
    ids: Mutex<BTreeSet<NodeId>>,
    notify: Notify,
}

impl DirtySet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an id
    ///
    /// Returns `false` if the id was already pending.
    pub fn insert(&self, id: NodeId) -> bool {
        let added = self.ids.lock().insert(id);
        self.notify.notify_one();
        added
    }

    /// Remove and return the lowest id, if any
    #[must_use]
    pub fn try_pop(&self) -> Option<NodeId> {
        self.ids.lock().pop_first()
    }

    /// Wait until an id is available, then remove and return the lowest one
    ///
    /// Cancel safe: an id is only removed when it is returned.
    pub async fn pop(&self) -> NodeId {
        loop {
            if let Some(id) = self.try_pop() {
                return id;
            }
            self.notify.notified().await;
        }
    }

    /// Like [`DirtySet::pop`], giving up after `timeout`
    ///
    /// # Errors
    /// - `PopTimeout` if the set stayed empty for the whole duration
    pub async fn pop_timeout(&self, timeout: Duration) -> Result<NodeId, PopTimeout> {
        tokio::time::timeout(timeout, self.pop())
            .await
            .map_err(|_| PopTimeout)
    }

    /// Check whether `id` is pending
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.lock().contains(id)
    }

    /// Number of pending ids
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// True when nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn insert_deduplicates() {
        let set = DirtySet::new();
        assert!(set.insert(NodeId::new("a")));
        assert!(!set.insert(NodeId::new("a")));
        assert_eq!(set.len(), 1);

        assert_eq!(set.try_pop(), Some(NodeId::new("a")));
        assert_eq!(set.try_pop(), None);
        assert!(set.is_empty());
    }

    #[test]
    fn pops_lowest_first() {
        let set = DirtySet::new();
        set.insert(NodeId::new("c"));
        set.insert(NodeId::new("a"));
        set.insert(NodeId::new("b"));

        assert_eq!(set.try_pop(), Some(NodeId::new("a")));
        assert_eq!(set.try_pop(), Some(NodeId::new("b")));
        assert_eq!(set.try_pop(), Some(NodeId::new("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn pop_timeout_on_empty_set() {
        let set = DirtySet::new();
        let result = set.pop_timeout(Duration::from_millis(25)).await;
        assert_eq!(result, Err(PopTimeout));
    }

    #[tokio::test]
    async fn pop_wakes_on_insert() {
        let set = Arc::new(DirtySet::new());
        let waiter = {
            let set = Arc::clone(&set);
            tokio::spawn(async move { set.pop().await })
        };

        tokio::task::yield_now().await;
        set.insert(NodeId::new("late"));

        let id = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, NodeId::new("late"));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn timed_out_pop_loses_nothing() {
        let set = DirtySet::new();
        assert!(set.pop_timeout(Duration::from_millis(5)).await.is_err());

        set.insert(NodeId::new("x"));
        assert!(set.contains(&NodeId::new("x")));
        let id = set.pop_timeout(Duration::from_millis(100)).await.unwrap();
        assert_eq!(id, NodeId::new("x"));
    }
}
