//! Snapshot collection: probe output → typed resources → snapshot.
//!
//! Pipeline:
//! - `table` decodes `ovn-nbctl --format=json` listings into rows of
//!   [`table::TableValue`], normalizing single-quoted output when needed
//! - `resources` projects rows into the four resource records
//! - `probe` runs the four listings through one runner, turning per-probe
//!   failures into warnings
//! - [`SnapshotCollector`] resolves the runner for a node, runs the probes,
//!   assembles the graph and stamps metadata

#[allow(clippy::module_inception)]
mod collector;
pub mod options;
pub mod probe;
pub mod resources;
pub mod table;

pub use collector::{CollectError, SnapshotCollector};
pub use options::CollectOptions;
pub use probe::{Collection, ResourceKind, collect_resources};
pub use resources::ResourceSet;
