//! Remote authority contract
//!
//! The authority holds the canonical state of every world. Clients only
//! need this request/response surface; the transport behind it is not
//! this crate's concern.

use crate::error::RemoteError;
use crate::ids::ClientId;
use crate::node::WireNode;
use crate::scope::{NodeScope, WorldScope};
use crate::topology::Topology;
use crate::NodeId;
use async_trait::async_trait;
use std::time::Duration;

/// Request/response interface to the remote authority
#[async_trait]
pub trait Authority: Send + Sync + std::fmt::Debug {
    /// Register a client by name, returning its identity
    async fn handshake(&self, client_name: &str) -> Result<ClientId, RemoteError>;

    /// Time since the authority started
    async fn uptime(&self, client: &ClientId) -> Result<Duration, RemoteError>;

    /// Current worlds and clients
    async fn topology(&self, client: &ClientId) -> Result<Topology, RemoteError>;

    /// All node ids of a world
    async fn list_node_ids(&self, scope: &WorldScope) -> Result<Vec<NodeId>, RemoteError>;

    /// Root node of a world
    ///
    /// Only `id` is guaranteed to be meaningful in the reply.
    async fn get_root_node(&self, scope: &WorldScope) -> Result<WireNode, RemoteError>;

    /// A single node
    ///
    /// # Errors
    /// - `RemoteError::NotFound` if the node does not exist
    async fn get_node(&self, scope: &NodeScope) -> Result<WireNode, RemoteError>;

    /// Create the node on first call for its id, replace it afterwards
    async fn update_node(&self, scope: &WorldScope, node: WireNode) -> Result<(), RemoteError>;

    /// Destroy every world
    async fn reset(&self, client: &ClientId) -> Result<(), RemoteError>;
}
