//! Snapshot types served to visualization clients.
//!
//! One `Snapshot` is the complete, self-contained topology graph for one node.
//! The JSON layout is stable across versions sharing the same `schemaVersion`.

pub mod snapshot;

pub use snapshot::{
    Edge, EdgeKind, Group, Metadata, Node, NodeKind, SCHEMA_VERSION, Snapshot, SourceHealth,
    Warning, WarningCode,
};
