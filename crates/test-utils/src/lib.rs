pub mod builders;
pub mod fake_delegates;

use std::sync::{Arc, Once};

use geocompile::config::ConfigFile;
use geocompile::dag::TargetGraph;
use geocompile::engine::{RunOptions, Runtime};
use geocompile::exec::DelegateRegistry;
use geocompile::store::{MemoryStatusStore, StatusStore};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// A runtime over `cfg`'s graph with the given delegates and an in-memory
/// store shared with the caller.
pub fn runtime_for(
    cfg: &ConfigFile,
    registry: DelegateRegistry,
    store: Arc<MemoryStatusStore>,
    options: RunOptions,
) -> Runtime {
    let graph = Arc::new(TargetGraph::from_config(cfg).expect("config graph must be valid"));
    let store: Arc<dyn StatusStore> = store;
    Runtime::new(graph, store, Arc::new(registry), options)
}
