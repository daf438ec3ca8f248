//! Node references
//!
//! A [`NodeRef`] is an id plus the cache that owns it. It holds no node
//! state of its own: every read and write goes through the cache, so a
//! reference always observes the latest state.

use crate::cache::NodeCache;
use crate::error::SceneError;
use crate::node::Node;
use std::collections::BTreeSet;
use std::sync::Arc;
use uwds_proto::{NodeId, NodeType, Transform};

/// Handle to a node inside a scene
#[derive(Debug, Clone)]
pub struct NodeRef {
    cache: Arc<NodeCache>,
    id: NodeId,
}

impl NodeRef {
    pub(crate) fn new(cache: Arc<NodeCache>, id: NodeId) -> Self {
        Self { cache, id }
    }

    /// Node identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Owning cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.cache
    }

    /// Copy of the current node state
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn snapshot(&self) -> Result<Node, SceneError> {
        self.cache.snapshot(&self.id)
    }

    /// Current name
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn name(&self) -> Result<String, SceneError> {
        self.cache.read(&self.id, |n| n.name().to_string())
    }

    /// Current classification
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn node_type(&self) -> Result<NodeType, SceneError> {
        self.cache.read(&self.id, Node::node_type)
    }

    /// Current transform
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn transform(&self) -> Result<Transform, SceneError> {
        self.cache.read(&self.id, |n| *n.transform())
    }

    /// Current parent id
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn parent(&self) -> Result<Option<NodeId>, SceneError> {
        self.cache.read(&self.id, |n| n.parent().cloned())
    }

    /// Current child ids
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn children(&self) -> Result<BTreeSet<NodeId>, SceneError> {
        self.cache.read(&self.id, |n| n.children().clone())
    }

    /// Mutated locally and not yet pushed
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn is_locally_dirty(&self) -> Result<bool, SceneError> {
        self.cache.read(&self.id, Node::is_locally_dirty)
    }

    /// Changed at the authority since it was last pulled
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn is_remotely_dirty(&self) -> Result<bool, SceneError> {
        self.cache.read(&self.id, Node::is_remotely_dirty)
    }

    /// Resolve the parent through the cache, without remote calls
    ///
    /// # Errors
    /// - `SceneError::NotFound` if this node or its parent is not cached
    pub fn parent_ref(&self) -> Result<Option<NodeRef>, SceneError> {
        self.parent()?
            .map(|id| self.cache.get_local(&id))
            .transpose()
    }

    /// Resolve the children through the cache, without remote calls
    ///
    /// # Errors
    /// - `SceneError::NotFound` if this node or one of its children is not cached
    pub fn child_refs(&self) -> Result<Vec<NodeRef>, SceneError> {
        self.children()?
            .iter()
            .map(|id| self.cache.get_local(id))
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutators: local only, each marks the node dirty

    /// Rename
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), SceneError> {
        let name = name.into();
        self.cache.modify(&self.id, |n| n.set_name(name))
    }

    /// Reclassify
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn set_type(&self, node_type: NodeType) -> Result<(), SceneError> {
        self.cache.modify(&self.id, |n| n.set_type(node_type))
    }

    /// Move
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn set_transform(&self, transform: Transform) -> Result<(), SceneError> {
        self.cache.modify(&self.id, |n| n.set_transform(transform))
    }

    /// Attach under `parent`; both sides are updated
    ///
    /// # Errors
    /// - `SceneError::InvalidState` if `parent` is not cached
    pub fn set_parent(&self, parent: &NodeId) -> Result<(), SceneError> {
        self.cache.set_parent(&self.id, parent)
    }

    /// Attach under `parent`, refusing links that would close a cycle
    ///
    /// # Errors
    /// - `SceneError::InvalidState` if `parent` is not cached or is a descendant
    pub fn set_parent_checked(&self, parent: &NodeId) -> Result<(), SceneError> {
        self.cache.set_parent_checked(&self.id, parent)
    }

    /// Detach from the parent; no-op without one
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn clear_parent(&self) -> Result<(), SceneError> {
        self.cache.clear_parent(&self.id)
    }

    /// Add a child; no-op if already present
    ///
    /// # Errors
    /// - `SceneError::InvalidState` if `child` is not cached
    pub fn append_child(&self, child: &NodeId) -> Result<(), SceneError> {
        self.cache.append_child(&self.id, child)
    }

    /// Remove a child; no-op if absent
    ///
    /// # Errors
    /// - `SceneError::NotFound` if the node is no longer cached
    pub fn remove_child(&self, child: &NodeId) -> Result<(), SceneError> {
        self.cache.remove_child(&self.id, child)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.cache, &other.cache)
    }
}

impl Eq for NodeRef {}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Ok(name) => write!(f, "{name} [{}]", self.id),
            Err(_) => write!(f, "<gone> [{}]", self.id),
        }
    }
}
