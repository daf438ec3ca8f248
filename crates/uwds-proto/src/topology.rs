//! Topology report: which clients exist and how they interact with worlds

use crate::ids::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a client interacts with a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    /// Only reads from the world
    Reader,
    /// Writes into the world
    Provider,
    /// Observes the world without being a regular reader
    Monitor,
    /// Reads one world and provides another
    Filter,
}

impl InteractionType {
    /// Lower-case display name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Provider => "provider",
            Self::Monitor => "monitor",
            Self::Filter => "filter",
        }
    }
}

/// A client's link to one world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// World name
    pub world: String,
    /// Kind of link
    pub interaction_type: InteractionType,
    /// Last time the client touched this world
    pub last_activity: DateTime<Utc>,
}

/// A connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Identity assigned at handshake
    pub id: ClientId,
    /// Name given at handshake
    pub name: String,
    /// Links to worlds
    pub links: Vec<Interaction>,
}

/// Snapshot of the authority's worlds and clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// World names
    pub worlds: BTreeSet<String>,
    /// Clients, sorted by id
    pub clients: Vec<ClientInfo>,
}

impl Topology {
    /// Lookup client by id
    #[must_use]
    pub fn client(&self, id: &ClientId) -> Option<&ClientInfo> {
        self.clients.iter().find(|c| &c.id == id)
    }
}
