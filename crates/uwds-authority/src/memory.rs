//! In-memory authority
//!
//! Holds every world in process. Worlds come into existence on first access
//! with a single `Entity` root named `"root"`. Updates are last-write-wins.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uwds_proto::{
    Authority, ClientId, ClientInfo, Interaction, InteractionType, NodeId, NodeScope, NodeType,
    RemoteError, Topology, WireNode, WorldScope,
};

/// Name given to the root node of a new world
pub const ROOT_NAME: &str = "root";

/// Nodes of one world
#[derive(Debug, Clone)]
struct WorldState {
    root: NodeId,
    nodes: BTreeMap<NodeId, WireNode>,
}

impl WorldState {
    fn new() -> Self {
        let mut root = WireNode::with_id(NodeId::generate());
        root.name = ROOT_NAME.to_string();
        root.node_type = NodeType::Entity;

        let mut nodes = BTreeMap::new();
        let id = root.id.clone();
        nodes.insert(id.clone(), root);

        Self { root: id, nodes }
    }
}

/// Registered client
#[derive(Debug, Clone)]
struct ClientRecord {
    name: String,
    links: HashMap<String, Interaction>,
}

/// Authority statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorityStats {
    /// Successful `update_node` calls
    pub updates: u64,
    /// Successful `get_node` calls
    pub fetches: u64,
}

/// Authority keeping all worlds in memory
#[derive(Debug)]
pub struct MemoryAuthority {
    started: Instant,
    worlds: DashMap<String, WorldState>,
    clients: DashMap<ClientId, ClientRecord>,
    online: AtomicBool,
    updates: AtomicU64,
    fetches: AtomicU64,
}

impl MemoryAuthority {
    /// Create an empty authority
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            worlds: DashMap::new(),
            clients: DashMap::new(),
            online: AtomicBool::new(true),
            updates: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// Simulate transport loss
    ///
    /// While offline every call fails with `RemoteError::Unavailable`.
    pub fn set_online(&self, online: bool) {
        tracing::info!("Authority going {}", if online { "online" } else { "offline" });
        self.online.store(online, Ordering::SeqCst);
    }

    /// Check reachability flag
    #[inline]
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Store a node directly, bypassing any client
    ///
    /// Creates the world if needed. Used to stage remote-only state.
    pub fn seed_node(&self, world: &str, node: WireNode) {
        self.worlds
            .entry(world.to_string())
            .or_insert_with(WorldState::new)
            .nodes
            .insert(node.id.clone(), node);
    }

    /// Read a stored node
    #[must_use]
    pub fn node(&self, world: &str, id: &NodeId) -> Option<WireNode> {
        self.worlds
            .get(world)
            .and_then(|w| w.nodes.get(id).cloned())
    }

    /// Root id of a world, if the world exists
    #[must_use]
    pub fn root_of(&self, world: &str) -> Option<NodeId> {
        self.worlds.get(world).map(|w| w.root.clone())
    }

    /// Number of nodes stored for a world
    #[must_use]
    pub fn node_count(&self, world: &str) -> usize {
        self.worlds.get(world).map_or(0, |w| w.nodes.len())
    }

    /// Call counters
    #[must_use]
    pub fn stats(&self) -> AuthorityStats {
        AuthorityStats {
            updates: self.updates.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("connection refused".to_string()))
        }
    }

    fn ensure_client(&self, client: &ClientId) -> Result<(), RemoteError> {
        if self.clients.contains_key(client) {
            Ok(())
        } else {
            Err(RemoteError::NotFound(format!("client {client}")))
        }
    }

    fn ensure_world(&self, world: &str) {
        if !self.worlds.contains_key(world) {
            self.worlds
                .entry(world.to_string())
                .or_insert_with(|| {
                    tracing::info!("Created new world {}", world);
                    WorldState::new()
                });
        }
    }

    /// Record a client's activity on a world
    ///
    /// A reader link never downgrades an existing link of another kind.
    fn touch_link(&self, scope: &WorldScope, kind: InteractionType) {
        if let Some(mut client) = self.clients.get_mut(&scope.client) {
            let kind = match client.links.get(&scope.world) {
                Some(current) if kind == InteractionType::Reader => current.interaction_type,
                _ => kind,
            };
            client.links.insert(
                scope.world.clone(),
                Interaction {
                    world: scope.world.clone(),
                    interaction_type: kind,
                    last_activity: Utc::now(),
                },
            );
        }
    }

    fn enter(&self, scope: &WorldScope, kind: InteractionType) -> Result<(), RemoteError> {
        self.ensure_online()?;
        self.ensure_client(&scope.client)?;
        self.ensure_world(&scope.world);
        self.touch_link(scope, kind);
        Ok(())
    }
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authority for MemoryAuthority {
    async fn handshake(&self, client_name: &str) -> Result<ClientId, RemoteError> {
        self.ensure_online()?;
        let id = ClientId::generate();
        self.clients.insert(
            id.clone(),
            ClientRecord {
                name: client_name.to_string(),
                links: HashMap::new(),
            },
        );
        tracing::info!("New client <{}> has connected", client_name);
        Ok(id)
    }

    async fn uptime(&self, client: &ClientId) -> Result<Duration, RemoteError> {
        self.ensure_online()?;
        self.ensure_client(client)?;
        Ok(self.started.elapsed())
    }

    async fn topology(&self, client: &ClientId) -> Result<Topology, RemoteError> {
        self.ensure_online()?;
        self.ensure_client(client)?;

        let worlds = self.worlds.iter().map(|w| w.key().clone()).collect();
        let mut clients: Vec<ClientInfo> = self
            .clients
            .iter()
            .map(|entry| {
                let mut links: Vec<Interaction> = entry.links.values().cloned().collect();
                links.sort_by(|a, b| a.world.cmp(&b.world));
                ClientInfo {
                    id: entry.key().clone(),
                    name: entry.name.clone(),
                    links,
                }
            })
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Topology { worlds, clients })
    }

    async fn list_node_ids(&self, scope: &WorldScope) -> Result<Vec<NodeId>, RemoteError> {
        self.enter(scope, InteractionType::Reader)?;
        Ok(self
            .worlds
            .get(&scope.world)
            .map(|w| w.nodes.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_root_node(&self, scope: &WorldScope) -> Result<WireNode, RemoteError> {
        self.enter(scope, InteractionType::Reader)?;
        self.worlds
            .get(&scope.world)
            .map(|w| WireNode::with_id(w.root.clone()))
            .ok_or_else(|| RemoteError::NotFound(format!("world {}", scope.world)))
    }

    async fn get_node(&self, scope: &NodeScope) -> Result<WireNode, RemoteError> {
        self.enter(&scope.scope, InteractionType::Reader)?;
        let node = self
            .worlds
            .get(scope.world())
            .and_then(|w| w.nodes.get(&scope.id).cloned());

        match node {
            Some(node) => {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                Ok(node)
            }
            None => {
                tracing::warn!(
                    "Client {} requested non-existent node {} in world {}",
                    scope.client(),
                    scope.id,
                    scope.world()
                );
                Err(RemoteError::NotFound(format!("node {}", scope.id)))
            }
        }
    }

    async fn update_node(&self, scope: &WorldScope, node: WireNode) -> Result<(), RemoteError> {
        self.enter(scope, InteractionType::Provider)?;
        let Some(mut world) = self.worlds.get_mut(&scope.world) else {
            return Err(RemoteError::NotFound(format!("world {}", scope.world)));
        };

        let action = if world.nodes.contains_key(&node.id) {
            "update"
        } else {
            "new"
        };
        tracing::debug!("{} node {} in world {}", action, node.id, scope.world);
        world.nodes.insert(node.id.clone(), node);
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reset(&self, client: &ClientId) -> Result<(), RemoteError> {
        self.ensure_online()?;
        self.ensure_client(client)?;
        tracing::info!("Client {} reset all worlds", client);
        self.worlds.clear();
        Ok(())
    }
}
