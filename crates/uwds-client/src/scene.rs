//! Replicated scenes
//!
//! A [`Scene`] is this client's replica of one world. It owns the node
//! cache, the background sync worker and the table mapping foreign node ids
//! to their local mirrors.

use crate::cache::NodeCache;
use crate::config::ClientConfig;
use crate::error::SceneError;
use crate::handle::NodeRef;
use crate::node::Node;
use crate::sync::{SyncCounters, SyncStats, SyncWorker};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use uwds_proto::{Authority, ClientId, NodeId, WorldScope};

/// One replicated world
#[derive(Debug)]
pub struct Scene {
    root: NodeId,
    nodes: Arc<NodeCache>,
    /// Foreign node id -> local mirror id. Entries are never removed.
    mirror_mappings: Mutex<BTreeMap<NodeId, NodeId>>,
    worker: Mutex<Option<SyncWorker>>,
    counters: Arc<SyncCounters>,
}

impl Scene {
    /// Open a world and start its sync worker
    ///
    /// Lists the world's nodes, prefetches them when configured to, then
    /// materialises the root.
    ///
    /// # Errors
    /// - `SceneError::Config` if `config` is invalid
    /// - `SceneError::Unavailable` if the authority cannot be reached
    /// - `SceneError::NotFound` if a listed node vanished before it was fetched
    pub async fn open(
        authority: Arc<dyn Authority>,
        client: ClientId,
        world: impl Into<String>,
        config: &ClientConfig,
    ) -> Result<Self, SceneError> {
        config.validate()?;
        let scope = WorldScope::new(client, world);
        let nodes = Arc::new(NodeCache::new(Arc::clone(&authority), scope.clone()));

        let ids = authority.list_node_ids(&scope).await?;
        if config.prefetch_nodes {
            futures::future::try_join_all(ids.iter().map(|id| nodes.get_or_fetch(id))).await?;
        }

        let root = authority.get_root_node(&scope).await?.id;
        nodes.get_or_fetch(&root).await?;

        let counters = Arc::new(SyncCounters::default());
        let worker = SyncWorker::spawn_with(
            Arc::clone(&nodes),
            config.sync_interval(),
            Arc::clone(&counters),
        );

        tracing::info!(
            "Opened world {} with {} nodes ({} cached)",
            scope.world,
            ids.len(),
            nodes.len()
        );

        Ok(Self {
            root,
            nodes,
            mirror_mappings: Mutex::new(BTreeMap::new()),
            worker: Mutex::new(Some(worker)),
            counters,
        })
    }

    /// World name
    #[inline]
    #[must_use]
    pub fn world(&self) -> &str {
        self.nodes.world()
    }

    /// Root node
    #[must_use]
    pub fn root(&self) -> NodeRef {
        NodeRef::new(Arc::clone(&self.nodes), self.root.clone())
    }

    /// Root node id
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Node cache
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &Arc<NodeCache> {
        &self.nodes
    }

    /// Return a node, fetching it on a cache miss
    ///
    /// # Errors
    /// - see [`NodeCache::get_or_fetch`]
    pub async fn node(&self, id: &NodeId) -> Result<NodeRef, SceneError> {
        self.nodes.get_or_fetch(id).await
    }

    /// Create a detached node and schedule it for push
    #[must_use]
    pub fn new_node(&self) -> NodeRef {
        self.nodes.insert_local(Node::new())
    }

    // ------------------------------------------------------------------
    // Mirroring

    /// Mirror a node of `source` into this scene
    ///
    /// Returns the existing mirror if `source_id` was mirrored before.
    /// Otherwise clones the node's attributes into a fresh local node and
    /// links it to whichever of its source parent and children already
    /// have mirrors here. Never fetches.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if `source_id` is not cached in `source`
    pub fn mirror(&self, source: &Scene, source_id: &NodeId) -> Result<NodeRef, SceneError> {
        let mut mappings = self.mirror_mappings.lock();
        if let Some(local) = mappings.get(source_id) {
            return self.nodes.get_local(local);
        }

        let original = source.nodes.snapshot(source_id)?;
        let mirror = self.nodes.insert_local(original.clone_detached());
        mappings.insert(source_id.clone(), mirror.id().clone());

        if let Some(local_parent) = original.parent().and_then(|p| mappings.get(p)) {
            self.nodes.set_parent(mirror.id(), local_parent)?;
        }
        for child in original.children() {
            if let Some(local_child) = mappings.get(child) {
                self.nodes.set_parent(local_child, mirror.id())?;
            }
        }

        tracing::debug!(
            "Mirrored node {} of world {} as {} in world {}",
            source_id,
            source.world(),
            mirror.id(),
            self.world()
        );
        Ok(mirror)
    }

    /// Local mirror of a foreign node, if any
    #[must_use]
    pub fn mirror_of(&self, source_id: &NodeId) -> Option<NodeId> {
        self.mirror_mappings.lock().get(source_id).cloned()
    }

    /// Copy of the mirror table
    #[must_use]
    pub fn mirror_mappings(&self) -> BTreeMap<NodeId, NodeId> {
        self.mirror_mappings.lock().clone()
    }

    // ------------------------------------------------------------------
    // Remote traffic

    /// Push a node to the authority now, bypassing the worker
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn commit(&self, id: &NodeId) -> Result<(), SceneError> {
        self.nodes.push(id).await
    }

    /// Re-fetch a node from the authority
    ///
    /// # Errors
    /// - see [`NodeCache::refresh`]
    pub async fn refresh(&self, id: &NodeId) -> Result<NodeRef, SceneError> {
        self.nodes.refresh(id).await
    }

    // ------------------------------------------------------------------
    // Worker lifecycle

    /// Sync worker statistics
    #[inline]
    #[must_use]
    pub fn sync_stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    /// True while the sync worker runs
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(SyncWorker::is_running)
    }

    /// Stop the sync worker and wait for it; pending dirty nodes stay queued
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown().await;
            tracing::info!("Closed world {}", self.world());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uwds_authority::MemoryAuthority;
    use uwds_proto::{NodeType, WireNode};

    async fn open(authority: &Arc<MemoryAuthority>, world: &str) -> Scene {
        let client = authority.handshake("scene tests").await.unwrap();
        let config = ClientConfig::default().with_sync_interval(Duration::from_millis(5));
        Scene::open(Arc::clone(authority) as Arc<dyn Authority>, client, world, &config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_materialises_root_and_prefetches() {
        let authority = Arc::new(MemoryAuthority::new());
        authority.seed_node("w", WireNode::with_id(NodeId::new("extra")));

        let scene = open(&authority, "w").await;
        assert_eq!(scene.world(), "w");
        assert_eq!(Some(scene.root_id().clone()), authority.root_of("w"));
        assert_eq!(scene.root().name().unwrap(), "root");
        assert!(scene.nodes().contains(&NodeId::new("extra")));
        assert!(scene.is_syncing());

        scene.shutdown().await;
        assert!(!scene.is_syncing());
    }

    #[tokio::test]
    async fn open_without_prefetch_caches_root_only() {
        let authority = Arc::new(MemoryAuthority::new());
        authority.seed_node("w", WireNode::with_id(NodeId::new("extra")));
        let client = authority.handshake("lazy").await.unwrap();
        let config = ClientConfig::default().with_prefetch(false);

        let scene = Scene::open(Arc::clone(&authority) as Arc<dyn Authority>, client, "w", &config)
            .await
            .unwrap();
        assert_eq!(scene.nodes().len(), 1);
        scene.node(&NodeId::new("extra")).await.unwrap();
        assert_eq!(scene.nodes().len(), 2);
        scene.shutdown().await;
    }

    #[tokio::test]
    async fn open_offline_is_unavailable() {
        let authority = Arc::new(MemoryAuthority::new());
        let client = authority.handshake("offline").await.unwrap();
        authority.set_online(false);

        let err = Scene::open(authority, client, "w", &ClientConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn open_rejects_invalid_config() {
        let authority = Arc::new(MemoryAuthority::new());
        let client = authority.handshake("bad config").await.unwrap();
        let config = ClientConfig {
            sync_interval_ms: 0,
            ..ClientConfig::default()
        };

        let err = Scene::open(Arc::clone(&authority) as Arc<dyn Authority>, client, "w", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SceneError::Config(_)));
        assert!(authority.root_of("w").is_none());
    }

    #[tokio::test]
    async fn new_node_is_detached_and_dirty() {
        let authority = Arc::new(MemoryAuthority::new());
        let scene = open(&authority, "w").await;
        scene.shutdown().await;

        let node = scene.new_node();
        assert_eq!(node.parent().unwrap(), None);
        assert!(node.children().unwrap().is_empty());
        assert!(node.is_locally_dirty().unwrap());
        assert!(scene.nodes().dirty().contains(node.id()));
    }

    #[tokio::test]
    async fn mirror_copies_attributes_with_fresh_id() {
        let authority = Arc::new(MemoryAuthority::new());
        let alpha = open(&authority, "alpha").await;
        let beta = open(&authority, "beta").await;

        let cup = alpha.new_node();
        cup.set_name("cup").unwrap();
        cup.set_type(NodeType::Mesh).unwrap();

        let mirror = beta.mirror(&alpha, cup.id()).unwrap();
        assert_ne!(mirror.id(), cup.id());
        assert_eq!(mirror.name().unwrap(), "cup");
        assert_eq!(mirror.node_type().unwrap(), NodeType::Mesh);
        assert_eq!(beta.mirror_of(cup.id()), Some(mirror.id().clone()));

        alpha.shutdown().await;
        beta.shutdown().await;
    }

    #[tokio::test]
    async fn mirror_is_idempotent() {
        let authority = Arc::new(MemoryAuthority::new());
        let alpha = open(&authority, "alpha").await;
        let beta = open(&authority, "beta").await;
        let node = alpha.new_node();

        let first = beta.mirror(&alpha, node.id()).unwrap();
        let cached = beta.nodes().len();
        node.set_name("renamed").unwrap();
        let second = beta.mirror(&alpha, node.id()).unwrap();

        assert_eq!(first, second);
        assert_eq!(beta.nodes().len(), cached);
        assert_ne!(second.name().unwrap(), "renamed");

        alpha.shutdown().await;
        beta.shutdown().await;
    }

    #[tokio::test]
    async fn mirror_of_unknown_node_is_not_found() {
        let authority = Arc::new(MemoryAuthority::new());
        let alpha = open(&authority, "alpha").await;
        let beta = open(&authority, "beta").await;

        let err = beta.mirror(&alpha, &NodeId::new("ghost")).unwrap_err();
        assert!(err.is_not_found());
        assert!(beta.mirror_mappings().is_empty());

        alpha.shutdown().await;
        beta.shutdown().await;
    }

    #[tokio::test]
    async fn mirror_into_same_scene() {
        let authority = Arc::new(MemoryAuthority::new());
        let scene = open(&authority, "w").await;
        let child = scene.new_node();
        child.set_parent(scene.root_id()).unwrap();

        let root_copy = scene.mirror(&scene, scene.root_id()).unwrap();
        let child_copy = scene.mirror(&scene, child.id()).unwrap();
        assert_eq!(child_copy.parent().unwrap(), Some(root_copy.id().clone()));

        scene.shutdown().await;
    }

    #[tokio::test]
    async fn dropped_scene_stops_pushing() {
        let authority = Arc::new(MemoryAuthority::new());
        let scene = open(&authority, "w").await;
        let nodes = Arc::clone(scene.nodes());
        drop(scene);

        let before = authority.stats().updates;
        let node = nodes.insert_local(Node::new());
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(authority.stats().updates, before);
        assert!(nodes.dirty().contains(node.id()));
        assert!(authority.node("w", node.id()).is_none());
    }

    #[tokio::test]
    async fn commit_pushes_immediately() {
        let authority = Arc::new(MemoryAuthority::new());
        let scene = open(&authority, "w").await;
        scene.shutdown().await;

        let node = scene.new_node();
        node.set_name("pushed").unwrap();
        scene.commit(node.id()).await.unwrap();
        assert_eq!(authority.node("w", node.id()).unwrap().name, "pushed");

        authority.set_online(false);
        let err = scene.commit(node.id()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
