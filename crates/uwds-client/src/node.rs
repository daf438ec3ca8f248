//! Scene graph vertex
//!
//! A [`Node`] is plain data. It never points at other nodes: parent and
//! children are ids, resolved through the owning [`crate::NodeCache`].
//! Structural changes that must touch two nodes at once live on the cache.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uwds_proto::{NodeId, NodeType, Transform, WireNode};

/// A single graph vertex
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    name: String,
    node_type: NodeType,
    parent: Option<NodeId>,
    children: BTreeSet<NodeId>,
    transform: Transform,
    last_update: DateTime<Utc>,
    /// Bumped on every local mutation
    revision: u64,
    /// Mutated locally, not yet pushed upstream
    locally_dirty: bool,
    /// The authority holds a newer version that was not pulled
    remotely_dirty: bool,
}

impl Node {
    /// Create a detached node with a fresh id and identity transform
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(NodeId::generate())
    }

    /// Create a detached node with a given id
    #[must_use]
    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            name: String::new(),
            node_type: NodeType::Undefined,
            parent: None,
            children: BTreeSet::new(),
            transform: Transform::IDENTITY,
            last_update: Utc::now(),
            revision: 0,
            locally_dirty: false,
            remotely_dirty: false,
        }
    }

    /// Copy name, type and transform under a fresh id
    ///
    /// The copy starts detached: parent and children are not carried over.
    #[must_use]
    pub fn clone_detached(&self) -> Self {
        let mut node = Self::new();
        node.name.clone_from(&self.name);
        node.node_type = self.node_type;
        node.transform = self.transform;
        node
    }

    /// Build from the authority's representation
    ///
    /// Remote-origin nodes start clean.
    #[must_use]
    pub fn from_wire(wire: WireNode) -> Self {
        let parent = wire.parent().cloned();
        Self {
            id: wire.id,
            name: wire.name,
            node_type: wire.node_type,
            parent,
            children: wire.children.into_iter().collect(),
            transform: wire.transform,
            last_update: Utc::now(),
            revision: 0,
            locally_dirty: false,
            remotely_dirty: false,
        }
    }

    /// Serialize for the authority
    #[must_use]
    pub fn to_wire(&self) -> WireNode {
        WireNode {
            id: self.id.clone(),
            name: self.name.clone(),
            node_type: self.node_type,
            parent: self.parent.clone().unwrap_or_else(|| NodeId::new("")),
            children: self.children.iter().cloned().collect(),
            transform: self.transform,
        }
    }

    // ------------------------------------------------------------------
    // Accessors

    /// Node identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classification
    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Parent id, if attached
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Child ids
    #[inline]
    #[must_use]
    pub fn children(&self) -> &BTreeSet<NodeId> {
        &self.children
    }

    /// Transform
    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Time of the last local mutation
    #[inline]
    #[must_use]
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Local mutation counter
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mutated locally and not pushed yet
    #[inline]
    #[must_use]
    pub fn is_locally_dirty(&self) -> bool {
        self.locally_dirty
    }

    /// Newer version known upstream
    #[inline]
    #[must_use]
    pub fn is_remotely_dirty(&self) -> bool {
        self.remotely_dirty
    }

    // ------------------------------------------------------------------
    // Attribute mutators

    /// Rename
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Reclassify
    pub fn set_type(&mut self, node_type: NodeType) {
        self.node_type = node_type;
        self.touch();
    }

    /// Move
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.touch();
    }

    // ------------------------------------------------------------------
    // One-sided structural edits, only the cache may pair them up

    pub(crate) fn set_parent_id(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
        self.touch();
    }

    pub(crate) fn insert_child_id(&mut self, child: NodeId) -> bool {
        let added = self.children.insert(child);
        if added {
            self.touch();
        }
        added
    }

    pub(crate) fn remove_child_id(&mut self, child: &NodeId) -> bool {
        let removed = self.children.remove(child);
        if removed {
            self.touch();
        }
        removed
    }

    // ------------------------------------------------------------------
    // Sync bookkeeping

    /// Record a local mutation
    pub(crate) fn touch(&mut self) {
        self.locally_dirty = true;
        self.revision += 1;
        self.last_update = Utc::now();
    }

    /// Clear the local dirty flag if nothing changed since `revision` was pushed
    pub(crate) fn mark_synced(&mut self, revision: u64) -> bool {
        if self.revision == revision {
            self.locally_dirty = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_remotely_dirty(&mut self, dirty: bool) {
        self.remotely_dirty = dirty;
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.id)
    }
}
