//! # redlink
//!
//! An asynchronous Redis client with cluster routing, pipelining, and
//! replica failover.
//!
//! ## Features
//!
//! - **RESP codec**: incremental decoding that never consumes a partial
//!   frame, so replies can arrive split across any read boundary
//! - **Single-node client**: one connection, one command in flight,
//!   request/response pairing guaranteed by an execution lock
//! - **Pipelining**: capture a batch of commands, flush them in one write,
//!   and collect per-entry results in order
//! - **Cluster routing**: CRC16 hash-slot calculation, `CLUSTER NODES`
//!   discovery, `MOVED` redirects followed with a single retry
//! - **Replica failover**: a `READONLY` rejection triggers a transparent
//!   reconnect to the advertised master
//!
//! ## Quick start
//!
//! ```no_run
//! use redlink::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("redis://localhost:6379").await?;
//!
//!     client.set("greeting", "hello".into()).await?;
//!     let value = client.get("greeting").await?;
//!     assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//!
//!     client.pipeline_start()?;
//!     client.execute(redlink::core::command::incr("counter")).await?;
//!     client.execute(redlink::core::command::incr("counter")).await?;
//!     let results = client.pipeline_execute().await?;
//!     assert_eq!(results.len(), 2);
//!     Ok(())
//! }
//! ```

/// Cluster routing and topology.
pub mod cluster;
/// Clients and command execution.
pub mod core;
/// RESP protocol: frames, codec, errors.
pub mod proto;

pub use crate::cluster::{key_slot, ClusterClient};
pub use crate::core::builder::ClientBuilder;
pub use crate::core::command::{Cmd, Expectation, Reply};
pub use crate::core::{Client, OnClose};
pub use crate::proto::error::{Error, Result};
pub use crate::proto::frame::Frame;
