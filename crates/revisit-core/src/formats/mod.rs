//! # Formats
//!
//! Versioned byte encodings shared by the redb backend and the snapshot
//! export/import paths.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, partition_from_bytes, partition_to_bytes,
    snapshot_from_bytes, snapshot_to_bytes,
};
