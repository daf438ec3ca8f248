//! Node wire shape
//!
//! Defines what crosses the wire for a single scene graph vertex:
//! - [`NodeType`] classification
//! - [`Transform`], an opaque 4x4 matrix
//! - [`WireNode`], the serialized node

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

/// Node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Not yet classified
    #[default]
    Undefined,
    /// Group of nodes forming a rigid or articulated body
    Entity,
    /// Renderable geometry
    Mesh,
    /// Viewpoint
    Camera,
}

impl NodeType {
    /// Lower-case display name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Entity => "entity",
            Self::Mesh => "mesh",
            Self::Camera => "camera",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 4x4 double precision transform, row-major
///
/// This layer copies and compares transforms but never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform(pub [f64; 16]);

impl Transform {
    /// Identity matrix
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Build from row-major values
    #[inline]
    #[must_use]
    pub fn from_row_major(values: [f64; 16]) -> Self {
        Self(values)
    }

    /// Row-major values
    #[inline]
    #[must_use]
    pub fn as_row_major(&self) -> &[f64; 16] {
        &self.0
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Serialized node as exchanged with the authority
///
/// `parent` is the empty id when the node has no parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    /// Node identity
    pub id: NodeId,
    /// Free-form name
    pub name: String,
    /// Classification
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Parent id, empty for none
    pub parent: NodeId,
    /// Child ids
    pub children: Vec<NodeId>,
    /// Transform, 16 doubles row-major
    pub transform: Transform,
}

impl WireNode {
    /// Minimal node with only an id, as returned by `GetRootNode`
    #[inline]
    #[must_use]
    pub fn with_id(id: NodeId) -> Self {
        Self {
            id,
            name: String::new(),
            node_type: NodeType::Undefined,
            parent: NodeId::new(""),
            children: Vec::new(),
            transform: Transform::IDENTITY,
        }
    }

    /// Parent id, if any
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        (!self.parent.is_empty()).then_some(&self.parent)
    }
}
