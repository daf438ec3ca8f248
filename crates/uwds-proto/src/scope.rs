//! Scoped request contexts
//!
//! Every world-targeted request carries a [`WorldScope`]; every
//! node-targeted request carries a [`NodeScope`].

use crate::ids::{ClientId, NodeId};
use serde::{Deserialize, Serialize};

/// `(client, world)` request context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldScope {
    /// Requesting client
    pub client: ClientId,
    /// Target world
    pub world: String,
}

impl WorldScope {
    /// Create scope
    #[inline]
    #[must_use]
    pub fn new(client: ClientId, world: impl Into<String>) -> Self {
        Self {
            client,
            world: world.into(),
        }
    }

    /// Narrow to a single node
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> NodeScope {
        NodeScope {
            scope: self.clone(),
            id,
        }
    }
}

/// `(client, world, node)` request context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeScope {
    /// Enclosing world scope
    pub scope: WorldScope,
    /// Target node
    pub id: NodeId,
}

impl NodeScope {
    /// Requesting client
    #[inline]
    #[must_use]
    pub fn client(&self) -> &ClientId {
        &self.scope.client
    }

    /// Target world
    #[inline]
    #[must_use]
    pub fn world(&self) -> &str {
        &self.scope.world
    }
}
