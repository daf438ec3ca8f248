//! Worlds registry and client context
//!
//! [`Context`] is the entry point: it performs the handshake, holds the
//! client identity and owns the [`Worlds`] registry. Each world name maps
//! to one shared [`World`], opened on first access.

use crate::config::ClientConfig;
use crate::error::SceneError;
use crate::scene::Scene;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uwds_proto::{Authority, ClientId, Topology};

/// A named world and its scene
#[derive(Debug)]
pub struct World {
    name: String,
    scene: Scene,
}

impl World {
    /// World name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replicated scene
    #[inline]
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

/// Registry of opened worlds, keyed by name
#[derive(Debug)]
pub struct Worlds {
    authority: Arc<dyn Authority>,
    client: ClientId,
    config: ClientConfig,
    map: Mutex<BTreeMap<String, Arc<World>>>,
}

impl Worlds {
    /// Create empty registry
    #[must_use]
    pub fn new(authority: Arc<dyn Authority>, client: ClientId, config: ClientConfig) -> Self {
        Self {
            authority,
            client,
            config,
            map: Mutex::new(BTreeMap::new()),
        }
    }

    /// Return the world named `name`, opening it on first access
    ///
    /// Concurrent callers asking for the same name get the same world.
    ///
    /// # Errors
    /// - see [`Scene::open`]
    pub async fn get_or_open(&self, name: &str) -> Result<Arc<World>, SceneError> {
        let mut map = self.map.lock().await;
        if let Some(world) = map.get(name) {
            return Ok(Arc::clone(world));
        }

        let scene = Scene::open(
            Arc::clone(&self.authority),
            self.client.clone(),
            name,
            &self.config,
        )
        .await?;
        let world = Arc::new(World {
            name: name.to_string(),
            scene,
        });
        map.insert(name.to_string(), Arc::clone(&world));
        Ok(world)
    }

    /// Number of opened worlds
    pub async fn len(&self) -> usize {
        self.map.lock().await.len()
    }

    /// True when no world was opened
    pub async fn is_empty(&self) -> bool {
        self.map.lock().await.is_empty()
    }

    /// Names of opened worlds, ordered
    pub async fn names(&self) -> Vec<String> {
        self.map.lock().await.keys().cloned().collect()
    }

    /// Stop the sync worker of every opened world
    pub async fn shutdown_all(&self) {
        let worlds: Vec<Arc<World>> = self.map.lock().await.values().cloned().collect();
        for world in worlds {
            world.scene.shutdown().await;
        }
    }
}

/// Connection to an authority
#[derive(Debug)]
pub struct Context {
    name: String,
    client: ClientId,
    authority: Arc<dyn Authority>,
    worlds: Worlds,
}

impl Context {
    /// Validate `config` and perform the handshake
    ///
    /// # Errors
    /// - `SceneError::Config` if the configuration is invalid
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn connect(
        authority: Arc<dyn Authority>,
        config: ClientConfig,
    ) -> Result<Self, SceneError> {
        config.validate()?;
        let client = authority.handshake(&config.client_name).await?;
        tracing::info!("Connected as {} ({})", config.client_name, client);

        Ok(Self {
            name: config.client_name.clone(),
            client: client.clone(),
            worlds: Worlds::new(Arc::clone(&authority), client, config),
            authority,
        })
    }

    /// Identity assigned at handshake
    #[inline]
    #[must_use]
    pub fn client(&self) -> &ClientId {
        &self.client
    }

    /// Name announced at handshake
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World registry
    #[inline]
    #[must_use]
    pub fn worlds(&self) -> &Worlds {
        &self.worlds
    }

    /// Shorthand for [`Worlds::get_or_open`]
    ///
    /// # Errors
    /// - see [`Scene::open`]
    pub async fn world(&self, name: &str) -> Result<Arc<World>, SceneError> {
        self.worlds.get_or_open(name).await
    }

    /// Authority uptime
    ///
    /// # Errors
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn uptime(&self) -> Result<Duration, SceneError> {
        Ok(self.authority.uptime(&self.client).await?)
    }

    /// Worlds and clients known to the authority
    ///
    /// # Errors
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn topology(&self) -> Result<Topology, SceneError> {
        Ok(self.authority.topology(&self.client).await?)
    }

    /// Destroy every world at the authority
    ///
    /// Scenes already opened by this context keep their local state.
    ///
    /// # Errors
    /// - `SceneError::Unavailable` if the authority cannot be reached
    pub async fn reset(&self) -> Result<(), SceneError> {
        tracing::warn!("Resetting all worlds");
        Ok(self.authority.reset(&self.client).await?)
    }

    /// Stop every scene's sync worker
    pub async fn close(&self) {
        self.worlds.shutdown_all().await;
        tracing::info!("Context {} closed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uwds_authority::MemoryAuthority;
    use uwds_proto::InteractionType;

    async fn connect(authority: &Arc<MemoryAuthority>, name: &str) -> Context {
        let config = ClientConfig::default().with_client_name(name);
        Context::connect(Arc::clone(authority) as Arc<dyn Authority>, config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_handshake() {
        let authority = Arc::new(MemoryAuthority::new());
        let config = ClientConfig::default().with_client_name("  ");
        let err = Context::connect(Arc::clone(&authority) as Arc<dyn Authority>, config)
            .await
            .unwrap_err();
        assert!(matches!(err, SceneError::Config(_)));

        let observer = connect(&authority, "observer").await;
        assert_eq!(observer.topology().await.unwrap().clients.len(), 1);
    }

    #[tokio::test]
    async fn same_name_returns_same_world() {
        let authority = Arc::new(MemoryAuthority::new());
        let ctx = connect(&authority, "viewer").await;

        let first = ctx.world("kitchen").await.unwrap();
        let second = ctx.worlds().get_or_open("kitchen").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "kitchen");
        assert_eq!(ctx.worlds().len().await, 1);

        ctx.world("garden").await.unwrap();
        assert_eq!(ctx.worlds().names().await, vec!["garden", "kitchen"]);
        ctx.close().await;
        assert!(!first.scene().is_syncing());
    }

    #[tokio::test]
    async fn topology_reports_reader_links() {
        let authority = Arc::new(MemoryAuthority::new());
        let ctx = connect(&authority, "viewer").await;
        ctx.world("kitchen").await.unwrap();

        let topology = ctx.topology().await.unwrap();
        assert!(topology.worlds.contains("kitchen"));
        let me = topology.client(ctx.client()).unwrap();
        assert_eq!(me.name, "viewer");
        assert_eq!(me.links.len(), 1);
        assert_eq!(me.links[0].interaction_type, InteractionType::Reader);

        ctx.close().await;
    }

    #[tokio::test]
    async fn uptime_and_reset() {
        let authority = Arc::new(MemoryAuthority::new());
        let ctx = connect(&authority, "admin").await;
        ctx.world("kitchen").await.unwrap();
        assert!(ctx.uptime().await.is_ok());

        ctx.reset().await.unwrap();
        assert!(authority.root_of("kitchen").is_none());
        ctx.close().await;
    }

    #[tokio::test]
    async fn unreachable_authority_fails_connect() {
        let authority = Arc::new(MemoryAuthority::new());
        authority.set_online(false);
        let err = Context::connect(authority, ClientConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
