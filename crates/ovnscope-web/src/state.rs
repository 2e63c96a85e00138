//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;

use ovnscope_core::collector::{CollectOptions, SnapshotCollector};
use ovnscope_core::exec::ClusterRunnerFactory;
use ovnscope_core::storage::FileSnapshotStore;

/// Where snapshots come from.
pub(crate) enum Source {
    /// Collected on demand from the cluster.
    Live(SnapshotCollector<ClusterRunnerFactory>),
    /// Served from pre-recorded files.
    Fixtures(FileSnapshotStore),
}

impl Source {
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Source::Live(_) => "live",
            Source::Fixtures(_) => "fixtures",
        }
    }
}

pub(crate) struct WebAppInner {
    pub(crate) source: Source,
    /// Defaults for every collection; immutable after startup.
    pub(crate) options: CollectOptions,
    /// Deadline for one live collection.
    pub(crate) request_timeout: Duration,
}

pub(crate) type SharedState = Arc<WebAppInner>;

pub(crate) type AppState = State<SharedState>;
