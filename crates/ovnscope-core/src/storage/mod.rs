//! Snapshot persistence for fixtures and offline serving.

mod file_store;

pub use file_store::{FileSnapshotStore, StoreError};
