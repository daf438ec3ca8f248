//! In-process Underworlds authority
//!
//! [`MemoryAuthority`] implements [`uwds_proto::Authority`] entirely in
//! memory. It is what tests and embedded setups connect to instead of a
//! remote service.

#![warn(unreachable_pub)]

pub mod memory;

pub use memory::{AuthorityStats, MemoryAuthority, ROOT_NAME};
