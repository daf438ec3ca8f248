//! Per-scene node cache
//!
//! [`NodeCache`] is the single owner of every [`Node`] of a scene. It:
//! - Serves cache hits locally and fetches misses from the authority
//! - Keeps both sides of every parent/child link in step
//! - Enqueues every mutated node into the scene's [`DirtySet`]
//!
//! All node state sits behind one lock, so a reader never sees half of a
//! link or a name without its timestamp. The lock is never held across an
//! `.await`.

use crate::dirty::DirtySet;
use crate::error::SceneError;
use crate::handle::NodeRef;
use crate::node::Node;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uwds_proto::{Authority, NodeId, WireNode, WorldScope};

/// Local map from id to node for one scene
#[derive(Debug)]
pub struct NodeCache {
    scope: WorldScope,
    authority: Arc<dyn Authority>,
    nodes: RwLock<BTreeMap<NodeId, Node>>,
    dirty: Arc<DirtySet>,
}

impl NodeCache {
    /// Create empty cache for a world
    #[must_use]
    pub fn new(authority: Arc<dyn Authority>, scope: WorldScope) -> Self {
        Self {
            scope,
            authority,
            nodes: RwLock::new(BTreeMap::new()),
            dirty: Arc::new(DirtySet::new()),
        }
    }

    /// Request context of this cache's world
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &WorldScope {
        &self.scope
    }

    /// World name
    #[inline]
    #[must_use]
    pub fn world(&self) -> &str {
        &self.scope.world
    }

    /// Authority this cache fetches from
    #[inline]
    #[must_use]
    pub fn authority(&self) -> &Arc<dyn Authority> {
        &self.authority
    }

    /// Nodes pending outbound sync
    #[inline]
    #[must_use]
    pub fn dirty(&self) -> &Arc<DirtySet> {
        &self.dirty
    }

    // ------------------------------------------------------------------
    // Lookup

    /// Return the cached node, fetching it from the authority on a miss
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the authority reports no such node
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn get_or_fetch(self: &Arc<Self>, id: &NodeId) -> Result<NodeRef, SceneError> {
        if self.contains(id) {
            return Ok(NodeRef::new(Arc::clone(self), id.clone()));
        }

        let wire = self.fetch(id).await?;
        // A concurrent caller may have inserted it while we were waiting.
        self.nodes
            .write()
            .entry(wire.id.clone())
            .or_insert_with(|| Node::from_wire(wire));

        Ok(NodeRef::new(Arc::clone(self), id.clone()))
    }

    /// Return the cached node without any remote call
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    pub fn get_local(self: &Arc<Self>, id: &NodeId) -> Result<NodeRef, SceneError> {
        if self.contains(id) {
            Ok(NodeRef::new(Arc::clone(self), id.clone()))
        } else {
            Err(SceneError::node_not_found(id))
        }
    }

    /// Check if node is cached
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.read().contains_key(id)
    }

    /// Number of cached nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// True when nothing is cached
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Cached nodes with the given name
    #[must_use]
    pub fn find_by_name(self: &Arc<Self>, name: &str) -> Vec<NodeRef> {
        self.nodes
            .read()
            .values()
            .filter(|n| n.name() == name)
            .map(|n| NodeRef::new(Arc::clone(self), n.id().clone()))
            .collect()
    }

    /// All cached nodes, ordered by id
    #[must_use]
    pub fn iter(self: &Arc<Self>) -> Vec<NodeRef> {
        self.nodes
            .read()
            .keys()
            .map(|id| NodeRef::new(Arc::clone(self), id.clone()))
            .collect()
    }

    /// All cached ids, ordered
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.read().keys().cloned().collect()
    }

    /// Copy of a cached node
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    pub fn snapshot(&self, id: &NodeId) -> Result<Node, SceneError> {
        self.read(id, Node::clone)
    }

    /// Run `f` against a cached node under the read lock
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    pub fn read<R>(&self, id: &NodeId, f: impl FnOnce(&Node) -> R) -> Result<R, SceneError> {
        self.nodes
            .read()
            .get(id)
            .map(f)
            .ok_or_else(|| SceneError::node_not_found(id))
    }

    // ------------------------------------------------------------------
    // Insertion and attribute mutation

    /// Insert or replace the entry for `node.id()`
    ///
    /// Does not mark the node dirty.
    pub fn insert(&self, node: Node) {
        self.nodes.write().insert(node.id().clone(), node);
    }

    /// Insert a locally created node and schedule it for push
    pub(crate) fn insert_local(self: &Arc<Self>, mut node: Node) -> NodeRef {
        node.touch();
        let id = node.id().clone();
        self.insert(node);
        self.dirty.insert(id.clone());
        NodeRef::new(Arc::clone(self), id)
    }

    /// Mutate one node's attributes and schedule it for push
    ///
    /// The node is enqueued only if `f` actually changed it.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    pub fn modify<R>(&self, id: &NodeId, f: impl FnOnce(&mut Node) -> R) -> Result<R, SceneError> {
        let (result, changed) = {
            let mut nodes = self.nodes.write();
            let node = nodes.get_mut(id).ok_or_else(|| SceneError::node_not_found(id))?;
            let before = node.revision();
            let result = f(node);
            (result, node.revision() != before)
        };
        if changed {
            self.dirty.insert(id.clone());
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Structure

    /// Make `parent` the parent of `child`, updating both sides
    ///
    /// Detaches `child` from its previous parent first. No cycle check.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if `child` is not cached
    /// - `SceneError::InvalidState` if `parent` is not cached
    pub fn set_parent(&self, child: &NodeId, parent: &NodeId) -> Result<(), SceneError> {
        let touched = {
            let mut nodes = self.nodes.write();
            Self::link(&mut nodes, child, parent)?
        };
        self.enqueue(touched);
        Ok(())
    }

    /// Like [`NodeCache::set_parent`], refusing links that would close a cycle
    ///
    /// The check and the link happen under the same write lock.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if `child` is not cached
    /// - `SceneError::InvalidState` if `parent` is not cached or is a descendant of `child`
    pub fn set_parent_checked(&self, child: &NodeId, parent: &NodeId) -> Result<(), SceneError> {
        let touched = {
            let mut nodes = self.nodes.write();
            if Self::closes_cycle(&nodes, child, parent) {
                return Err(SceneError::InvalidState(format!(
                    "making {parent} the parent of {child} would create a cycle"
                )));
            }
            Self::link(&mut nodes, child, parent)?
        };
        self.enqueue(touched);
        Ok(())
    }

    /// Detach `child` from its parent, updating both sides
    ///
    /// No-op if `child` has no parent.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if `child` is not cached
    pub fn clear_parent(&self, child: &NodeId) -> Result<(), SceneError> {
        let touched = {
            let mut nodes = self.nodes.write();
            Self::unlink(&mut nodes, child)?
        };
        self.enqueue(touched);
        Ok(())
    }

    /// Add `child` under `parent`, updating both sides
    ///
    /// No-op if already linked.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if `parent` is not cached
    /// - `SceneError::InvalidState` if `child` is not cached
    pub fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), SceneError> {
        let touched = {
            let mut nodes = self.nodes.write();
            if !nodes.contains_key(parent) {
                return Err(SceneError::node_not_found(parent));
            }
            if !nodes.contains_key(child) {
                return Err(SceneError::unresolved(child));
            }
            Self::link(&mut nodes, child, parent)?
        };
        self.enqueue(touched);
        Ok(())
    }

    /// Remove `child` from `parent`, updating both sides
    ///
    /// No-op if `child` is not among the children of `parent`.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if `parent` is not cached
    pub fn remove_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), SceneError> {
        let touched = {
            let mut nodes = self.nodes.write();
            let parent_node = nodes
                .get_mut(parent)
                .ok_or_else(|| SceneError::node_not_found(parent))?;
            if !parent_node.remove_child_id(child) {
                return Ok(());
            }

            let mut touched = vec![parent.clone()];
            if let Some(child_node) = nodes.get_mut(child) {
                if child_node.parent() == Some(parent) {
                    child_node.set_parent_id(None);
                    touched.push(child.clone());
                }
            }
            touched
        };
        self.enqueue(touched);
        Ok(())
    }

    /// Check whether linking `child` under `parent` would close a cycle
    ///
    /// Walks parent links upwards from `parent`, O(depth). Cache-only.
    #[must_use]
    pub fn would_create_cycle(&self, child: &NodeId, parent: &NodeId) -> bool {
        Self::closes_cycle(&self.nodes.read(), child, parent)
    }

    fn closes_cycle(nodes: &BTreeMap<NodeId, Node>, child: &NodeId, parent: &NodeId) -> bool {
        let mut seen = BTreeSet::new();
        let mut cursor = Some(parent);

        while let Some(id) = cursor {
            if id == child {
                return true;
            }
            if !seen.insert(id) {
                // Pre-existing cycle above `parent` that does not include `child`.
                return false;
            }
            cursor = nodes.get(id).and_then(Node::parent);
        }
        false
    }

    /// Both-sides link; caller holds the write lock
    fn link(
        nodes: &mut BTreeMap<NodeId, Node>,
        child: &NodeId,
        parent: &NodeId,
    ) -> Result<Vec<NodeId>, SceneError> {
        if !nodes.contains_key(parent) {
            return Err(SceneError::unresolved(parent));
        }
        let previous = nodes
            .get(child)
            .ok_or_else(|| SceneError::node_not_found(child))?
            .parent()
            .cloned();

        if previous.as_ref() == Some(parent) {
            // Already linked on the child side; repair the parent side if needed.
            let added = nodes
                .get_mut(parent)
                .is_some_and(|p| p.insert_child_id(child.clone()));
            return Ok(if added { vec![parent.clone()] } else { Vec::new() });
        }

        let mut touched = Vec::with_capacity(3);
        if let Some(old) = previous {
            if let Some(old_node) = nodes.get_mut(&old) {
                old_node.remove_child_id(child);
                touched.push(old);
            }
        }
        if let Some(child_node) = nodes.get_mut(child) {
            child_node.set_parent_id(Some(parent.clone()));
        }
        if let Some(parent_node) = nodes.get_mut(parent) {
            parent_node.insert_child_id(child.clone());
        }
        touched.push(child.clone());
        touched.push(parent.clone());
        Ok(touched)
    }

    /// Both-sides unlink; caller holds the write lock
    fn unlink(
        nodes: &mut BTreeMap<NodeId, Node>,
        child: &NodeId,
    ) -> Result<Vec<NodeId>, SceneError> {
        let child_node = nodes
            .get_mut(child)
            .ok_or_else(|| SceneError::node_not_found(child))?;
        let Some(old) = child_node.parent().cloned() else {
            return Ok(Vec::new());
        };
        child_node.set_parent_id(None);

        let mut touched = vec![child.clone()];
        if let Some(old_node) = nodes.get_mut(&old) {
            old_node.remove_child_id(child);
            touched.push(old);
        }
        Ok(touched)
    }

    fn enqueue(&self, ids: Vec<NodeId>) {
        for id in ids {
            self.dirty.insert(id);
        }
    }

    // ------------------------------------------------------------------
    // Remote traffic

    async fn fetch(&self, id: &NodeId) -> Result<WireNode, SceneError> {
        tracing::debug!("Fetching node {} from world {}", id, self.world());
        let wire = self.authority.get_node(&self.scope.node(id.clone())).await?;
        if &wire.id != id {
            return Err(SceneError::InvalidState(format!(
                "authority answered node {} for request {}",
                wire.id, id
            )));
        }
        Ok(wire)
    }

    /// Push the current state of a node to the authority
    ///
    /// Clears both dirty flags unless the node was mutated again while the
    /// request was in flight.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn push(&self, id: &NodeId) -> Result<(), SceneError> {
        let (wire, revision) = self.read(id, |n| (n.to_wire(), n.revision()))?;
        self.authority.update_node(&self.scope, wire).await?;
        if let Some(node) = self.nodes.write().get_mut(id) {
            // Our state overwrote whatever the authority held.
            if node.mark_synced(revision) {
                node.set_remotely_dirty(false);
            }
        }
        Ok(())
    }

    /// Re-fetch a node from the authority
    ///
    /// A clean cached node is replaced with the remote state. A locally
    /// dirty one keeps its local state and is flagged remotely dirty; its
    /// next push wins at the authority.
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the authority reports no such node
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn refresh(self: &Arc<Self>, id: &NodeId) -> Result<NodeRef, SceneError> {
        let wire = self.fetch(id).await?;
        {
            let mut nodes = self.nodes.write();
            let keep_local = nodes.get(id).is_some_and(Node::is_locally_dirty);
            if keep_local {
                tracing::debug!("Node {} changed on both sides, keeping local state", id);
                if let Some(local) = nodes.get_mut(id) {
                    local.set_remotely_dirty(true);
                }
            } else {
                nodes.insert(id.clone(), Node::from_wire(wire));
            }
        }
        Ok(NodeRef::new(Arc::clone(self), id.clone()))
    }

    /// Flag a cached node as changed upstream
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is not cached
    pub fn mark_remotely_dirty(&self, id: &NodeId) -> Result<(), SceneError> {
        self.nodes
            .write()
            .get_mut(id)
            .map(|n| n.set_remotely_dirty(true))
            .ok_or_else(|| SceneError::node_not_found(id))
    }
}
