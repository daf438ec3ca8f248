//! Underworlds protocol types
//!
//! Everything a client and an authority agree on:
//! - Node and client identifiers
//! - The serialized node shape
//! - Topology reports
//! - Scoped request contexts
//! - The [`Authority`] trait itself

#![warn(unreachable_pub)]

pub mod authority;
pub mod error;
pub mod ids;
pub mod node;
pub mod scope;
pub mod topology;

pub use authority::Authority;
pub use error::RemoteError;
pub use ids::{ClientId, NodeId};
pub use node::{NodeType, Transform, WireNode};
pub use scope::{NodeScope, WorldScope};
pub use topology::{ClientInfo, Interaction, InteractionType, Topology};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
