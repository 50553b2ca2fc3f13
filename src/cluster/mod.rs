//! Cluster support: hash-slot routing, topology discovery, and the
//! cluster-aware client.
//!
//! ## Modules
//!
//! - [`slot`] - CRC16 hash-slot calculation
//! - [`topology`] - `CLUSTER NODES` parsing
//! - [`client`] - The cluster-aware client

/// Cluster-aware client.
pub mod client;
/// Hash-slot calculation.
pub mod slot;
/// Topology discovery parsing.
pub mod topology;

pub(crate) mod redirect;

pub use client::ClusterClient;
pub use slot::{key_slot, SLOT_COUNT};
pub use topology::{parse_cluster_nodes, NodeFlags, NodeInfo};
