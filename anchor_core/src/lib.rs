//! Core anchor types and traits.
//!
//! This crate defines the shared vocabulary used by all anchor crates.
//!
//! ## Content-addressed types
//!
//! - Identifiers (`hash::Hash`), a BLAKE3 digest naming a block of bytes
//! - DAG nodes (`node::Node`, `node::Link`), whose identifier is the hash of
//!   their canonical CBOR encoding
//!
//! Changing the encoding of either changes every identifier derived from it,
//! so both are treated as stable formats.
//!
//! ## Storage abstractions
//!
//! - `Store`: path-addressed byte storage, implemented by the backends in
//!   `anchor_store_local` and `anchor_store_memory`
//! - `BlockStore`: content-addressed facade over a `Store`
//! - `DagService`: node-level access (get/add/remove/fetch_graph), with the
//!   `BlockDag` implementation over a `BlockStore`
//! - `Datastore`: small fixed-key records such as the durable pin root,
//!   implemented in-memory here and by `anchor_datastore_redb`

pub mod block;
pub mod dag;
pub mod datastore;
pub mod hash;
pub mod node;
pub mod store;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

// --- Core Public Surface ---

pub use hash::{Hash, HashError};
pub use node::{Link, Node, NodeError};

pub use block::BlockStore;
pub use dag::{BlockDag, DagService};
pub use datastore::{Datastore, MemoryDatastore};
pub use store::{Store, StoreError, StoreFeatures, StoreResult};
