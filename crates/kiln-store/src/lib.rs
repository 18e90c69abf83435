//! # kiln-store
//! Persistent block storage with main-chain bookkeeping.
//!
//! - [`codec`]: RLP encoding of per-height [`BlockMetadata`](kiln_core::types::BlockMetadata) lists
//! - [`legacy`]: migration-only reader for the pre-RLP metadata layout
//! - [`HeightIndex`]: height → metadata list array
//! - [`BlockObjects`]: hash → block body map
//! - [`BlockStore`]: the two combined, with `re_branch` and `revert`
//! - [`RocksKeyValueStore`]: RocksDB backend
//! - [`StoreConfig`]: paths, cache sizes and commit mode

pub mod block_objects;
pub mod block_store;
pub mod codec;
pub mod config;
pub mod height_index;
pub mod legacy;
pub mod rocks;

pub use block_objects::BlockObjects;
pub use block_store::{BlockStore, SharedBlockStore};
pub use config::StoreConfig;
pub use height_index::HeightIndex;
pub use rocks::RocksKeyValueStore;
