//! Underworlds client
//!
//! Keeps a locally cached, partially replicated copy of remote scene graphs
//! in step with an authority:
//! - [`NodeCache`]: per-scene node store with fetch on miss
//! - [`DirtySet`] and [`SyncWorker`]: background push of local changes
//! - [`Scene::mirror`]: order-independent copying of nodes across scenes
//! - [`Context`] and [`Worlds`]: handshake and world registry
//!
//! # Example
//!
//! ```ignore
//! let ctx = Context::connect(authority, ClientConfig::default()).await?;
//! let world = ctx.world("kitchen").await?;
//! let cup = world.scene().new_node();
//! cup.set_name("cup")?;
//! cup.set_parent(world.scene().root_id())?;
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod config;
pub mod dirty;
pub mod error;
pub mod handle;
pub mod node;
pub mod scene;
pub mod sync;
pub mod world;

pub use cache::NodeCache;
pub use config::ClientConfig;
pub use dirty::{DirtySet, PopTimeout};
pub use error::{ConfigError, SceneError};
pub use handle::NodeRef;
pub use node::Node;
pub use scene::Scene;
pub use sync::{SyncCounters, SyncStats, SyncWorker};
pub use world::{Context, World, Worlds};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{ClientConfig, Context, NodeRef, Scene, SceneError};
    pub use uwds_proto::{Authority, NodeId, NodeType, Transform};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
