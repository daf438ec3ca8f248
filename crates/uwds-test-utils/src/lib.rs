//! Testing utilities for the Underworlds workspace
//!
//! Shared test helpers and fixtures over [`MemoryAuthority`].

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use uwds_authority::MemoryAuthority;
use uwds_client::{ClientConfig, Context, Scene};
use uwds_proto::Authority;

/// Poll interval for fixtures; short so tests settle quickly
pub const TEST_SYNC_INTERVAL: Duration = Duration::from_millis(5);

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses
///
/// Sleeps between polls, so background tasks on the same runtime progress.
pub async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

pub fn memory_authority() -> Arc<MemoryAuthority> {
    init_tracing();
    Arc::new(MemoryAuthority::new())
}

pub fn test_config(name: &str) -> ClientConfig {
    ClientConfig::default()
        .with_client_name(name)
        .with_sync_interval(TEST_SYNC_INTERVAL)
}

pub async fn connected_context(
    authority: &Arc<MemoryAuthority>,
    name: &str,
) -> anyhow::Result<Context> {
    let authority: Arc<dyn Authority> = Arc::clone(authority) as Arc<dyn Authority>;
    Ok(Context::connect(authority, test_config(name)).await?)
}

pub async fn open_scene(authority: &Arc<MemoryAuthority>, world: &str) -> anyhow::Result<Scene> {
    let client = authority.handshake("fixture").await?;
    let authority: Arc<dyn Authority> = Arc::clone(authority) as Arc<dyn Authority>;
    Ok(Scene::open(authority, client, world, &test_config("fixture")).await?)
}
