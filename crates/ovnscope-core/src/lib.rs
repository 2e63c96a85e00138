//! ovnscope-core: probe-and-assemble pipeline for OVN logical topology.
//!
//! Provides:
//! - `collector`: probe output decoding, resource parsing, probe orchestration,
//!   and the per-node `SnapshotCollector`
//! - `graph`: deterministic node/edge assembly from the four resource tables
//! - `exec`: remote execution: runner abstraction, cluster target resolution
//!   with ordered failover, `kubectl` client, cancellation
//! - `api`: the canonical snapshot JSON model
//! - `storage`: file-backed snapshot store (fixtures, offline serving)
//!
//! With `api` feature:
//! - OpenAPI schemas (`utoipa::ToSchema`) for the snapshot model

pub mod api;
pub mod collector;
pub mod exec;
pub mod graph;
pub mod storage;

/// Crate version with the git revision it was built from.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ")");
