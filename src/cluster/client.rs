use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cluster::redirect::{self, Redirect};
use crate::cluster::slot::key_slot;
use crate::cluster::topology::{parse_cluster_nodes, NodeInfo};
use crate::core::command::{self, apply_expectation, Cmd, Reply};
use crate::core::connection::Connection;
use crate::core::info;
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// Asynchronous client for a cluster of server nodes.
///
/// Commands are routed to the node owning the key's hash slot. A `MOVED`
/// redirect or a read-only rejection triggers one transparent retry against
/// the corrected node; a second redirect in the same call surfaces to the
/// caller.
///
/// Cheap to clone; all clones share the topology table and its execution
/// lock, so at most one command is in flight across the cluster at a time
/// and reply pairing stays correct on every connection.
///
/// # Example
///
/// ```no_run
/// use redlink::ClusterClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ClusterClient::connect("10.0.0.1:7000,10.0.0.2:7000").await?;
///     client.set("foo", "bar".into()).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ClusterClient {
    shared: Arc<ClusterShared>,
}

struct ClusterShared {
    /// Topology table and every node connection, behind the execution lock.
    topology: Mutex<Topology>,
}

/// Per-node state and routing, keyed by `host:port`.
struct Topology {
    nodes: BTreeMap<String, Node>,
}

struct Node {
    info: NodeInfo,
    /// Set when the node rejected a write; routing avoids the node until a
    /// refresh reports its role again.
    read_only: bool,
    connection: Connection,
}

impl Node {
    fn new(info: NodeInfo) -> Self {
        Self {
            read_only: info.flags.replica,
            connection: Connection::new(info.host.clone(), info.port, 0),
            info,
        }
    }
}

impl ClusterClient {
    /// Connects using a comma-separated list of `host:port` seed endpoints.
    ///
    /// Seeds are tried in order until one answers the topology query; the
    /// discovered topology then drives connections to every node, and the
    /// whole connect fails if any node cannot be reached.
    pub async fn connect<T: AsRef<str>>(seeds: T) -> Result<Self> {
        let endpoints = parse_seeds(seeds.as_ref())?;
        let mut last_err = None;
        for (host, port) in &endpoints {
            match discover_from(host, *port).await {
                Ok(nodes) => return Self::build(nodes).await,
                Err(e) => {
                    warn!(seed = %format!("{}:{}", host, port), error = %e, "seed unavailable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::invalid("no seed endpoints")))
    }

    async fn build(infos: Vec<NodeInfo>) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for info in infos {
            if info.flags.noaddr {
                continue;
            }
            nodes.insert(info.addr(), Node::new(info));
        }
        if nodes.is_empty() {
            return Err(Error::protocol("topology has no addressable nodes"));
        }

        futures::future::try_join_all(
            nodes.values_mut().map(|node| node.connection.connect()),
        )
        .await?;
        info!(nodes = nodes.len(), "cluster topology established");

        Ok(Self {
            shared: Arc::new(ClusterShared {
                topology: Mutex::new(Topology { nodes }),
            }),
        })
    }

    /// Executes a command against the node owning its key's slot, returning
    /// its (optionally coerced) reply.
    pub async fn execute(&self, cmd: Cmd) -> Result<Reply> {
        let expectation = cmd.expectation();
        let frame = self.execute_frame(&cmd).await?;
        Ok(apply_expectation(frame, expectation))
    }

    async fn execute_frame(&self, cmd: &Cmd) -> Result<Frame> {
        let mut topo = self.shared.topology.lock().await;
        let addr = topo
            .route(cmd.key())
            .ok_or_else(|| Error::connection("no known cluster nodes"))?;
        let frame = cmd.to_frame();

        let reply = topo.round_trip(&addr, &frame).await?;
        let line = match reply {
            Frame::Error(line) => line,
            other => return Ok(other),
        };

        // One corrective retry per call; a second redirect surfaces as-is.
        let retry_addr = match redirect::classify(&line) {
            Redirect::Moved { slot, host, port } => {
                debug!(slot, target = %format!("{}:{}", host, port), "following MOVED redirect");
                topo.ensure_node(host, port).await?
            }
            Redirect::ReadOnly => {
                warn!(node = %addr, "node is read-only, failing over");
                topo.failover(&addr).await?
            }
            Redirect::None => return Err(Error::redis(&line)),
        };

        match topo.round_trip(&retry_addr, &frame).await? {
            Frame::Error(line) => Err(Error::redis(&line)),
            other => Ok(other),
        }
    }

    /// Re-runs topology discovery against any reachable node and merges the
    /// result into the table by address, closing nodes that vanished.
    pub async fn refresh_topology(&self) -> Result<()> {
        self.shared.topology.lock().await.refresh().await
    }

    /// True only when every known node's connection is established.
    pub async fn ready(&self) -> bool {
        let topo = self.shared.topology.lock().await;
        !topo.nodes.is_empty() && topo.nodes.values().all(|n| n.connection.connected())
    }

    /// Number of nodes currently in the topology table.
    pub async fn node_count(&self) -> usize {
        self.shared.topology.lock().await.nodes.len()
    }

    /// Closes every node connection.
    pub async fn close(&self) -> Result<()> {
        let mut topo = self.shared.topology.lock().await;
        for node in topo.nodes.values_mut() {
            node.connection.close()?;
        }
        Ok(())
    }

    /// Gets the value of a key from its owning node.
    pub async fn get(&self, key: impl Into<Bytes>) -> Result<Option<Bytes>> {
        let frame = self.execute_frame(&command::get(key)).await?;
        command::frame_to_bytes(frame)
    }

    /// Sets the value of a key on its owning node.
    pub async fn set(&self, key: impl Into<Bytes>, value: Bytes) -> Result<()> {
        let frame = self.execute_frame(&command::set(key, value)).await?;
        command::frame_ok(frame)
    }

    /// Deletes keys, one call per key so each routes independently.
    /// Returns how many existed.
    pub async fn del<T: Into<Bytes>>(
        &self,
        keys: impl IntoIterator<Item = T>,
    ) -> Result<i64> {
        let mut removed = 0;
        for key in keys {
            let frame = self.execute_frame(&command::del([key.into()])).await?;
            removed += command::frame_to_int(frame)?;
        }
        Ok(removed)
    }

    /// Returns how many of the given keys exist, routing each key to its
    /// owning node.
    pub async fn exists<T: Into<Bytes>>(
        &self,
        keys: impl IntoIterator<Item = T>,
    ) -> Result<i64> {
        let mut present = 0;
        for key in keys {
            let frame = self.execute_frame(&command::exists([key.into()])).await?;
            present += command::frame_to_int(frame)?;
        }
        Ok(present)
    }

    /// Increments a key by one on its owning node, returning the new value.
    pub async fn incr(&self, key: impl Into<Bytes>) -> Result<i64> {
        let frame = self.execute_frame(&command::incr(key)).await?;
        command::frame_to_int(frame)
    }
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient").finish_non_exhaustive()
    }
}

impl Topology {
    /// Picks the address to dispatch to.
    ///
    /// A keyed command targets the writable master owning the key's slot.
    /// With no key, or when no owner is known (a coverage gap the remote
    /// cluster must resolve), any writable node is used and the node's own
    /// redirect reply drives correction.
    fn route(&self, key: Option<&[u8]>) -> Option<String> {
        if let Some(key) = key {
            let slot = key_slot(key);
            let owner = self.nodes.iter().find(|(_, node)| {
                node.info.flags.master && !node.read_only && node.info.owns_slot(slot)
            });
            if let Some((addr, _)) = owner {
                return Some(addr.clone());
            }
        }
        self.nodes
            .iter()
            .find(|(_, node)| !node.read_only)
            .map(|(addr, _)| addr.clone())
            .or_else(|| self.nodes.keys().next().cloned())
    }

    async fn round_trip(&mut self, addr: &str, frame: &Frame) -> Result<Frame> {
        let node = self
            .nodes
            .get_mut(addr)
            .ok_or_else(|| Error::connection(format!("unknown node {}", addr)))?;
        node.connection.ensure_connected().await?;
        node.connection.round_trip(frame).await
    }

    /// Returns the table key for a node, creating and connecting it first
    /// if a redirect named a node discovery has not seen yet.
    async fn ensure_node(&mut self, host: String, port: u16) -> Result<String> {
        let addr = format!("{}:{}", host, port);
        match self.nodes.get_mut(&addr) {
            Some(node) => node.connection.ensure_connected().await?,
            None => {
                debug!(node = %addr, "adding node learned from redirect");
                let mut node = Node::new(NodeInfo::ephemeral(host, port));
                node.connection.connect().await?;
                self.nodes.insert(addr.clone(), node);
            }
        }
        Ok(addr)
    }

    /// Fails a read-only node over to the master it advertises.
    ///
    /// The replication query runs on the old connection; the node is marked
    /// read-only so routing avoids it, its connection is closed exactly
    /// once, and the master's connection is created or reused. Returns the
    /// master's table key.
    async fn failover(&mut self, addr: &str) -> Result<String> {
        let (host, port) = {
            let node = self
                .nodes
                .get_mut(addr)
                .ok_or_else(|| Error::connection(format!("unknown node {}", addr)))?;
            node.read_only = true;
            let reply = node
                .connection
                .round_trip(&command::info_replication().to_frame())
                .await
                .map_err(|e| Error::connect(format!("replication query failed: {}", e)))?;
            let payload = reply
                .into_bulk()
                .ok_or_else(|| Error::connect("unexpected replication info reply"))?;
            let pair = info::master_address(&info::parse_info(&payload))
                .ok_or_else(|| Error::connect("no master address in replication info"))?;
            node.connection.close()?;
            pair
        };
        self.ensure_node(host, port).await
    }

    async fn refresh(&mut self) -> Result<()> {
        let addr = self
            .route(None)
            .ok_or_else(|| Error::connection("no known cluster nodes"))?;
        let reply = self
            .round_trip(&addr, &command::cluster_nodes().to_frame())
            .await?;
        let payload = match reply {
            Frame::Error(line) => return Err(Error::redis(&line)),
            other => other
                .into_bulk()
                .ok_or_else(|| Error::protocol("unexpected topology reply"))?,
        };
        self.merge(parse_cluster_nodes(&payload)?).await
    }

    /// Merges a fresh discovery snapshot into the table: known addresses
    /// keep their connection but take the new role and slot data, new nodes
    /// are connected, and vanished nodes are dropped.
    async fn merge(&mut self, infos: Vec<NodeInfo>) -> Result<()> {
        let mut seen = Vec::with_capacity(infos.len());
        for info in infos {
            if info.flags.noaddr {
                continue;
            }
            let addr = info.addr();
            seen.push(addr.clone());
            match self.nodes.get_mut(&addr) {
                Some(node) => {
                    node.read_only = info.flags.replica;
                    node.info = info;
                }
                None => {
                    let mut node = Node::new(info);
                    node.connection.connect().await?;
                    self.nodes.insert(addr, node);
                }
            }
        }
        self.nodes.retain(|addr, _| seen.contains(addr));
        Ok(())
    }
}

fn parse_seeds(raw: &str) -> Result<Vec<(String, u16)>> {
    let mut endpoints = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| Error::invalid(format!("invalid seed port in {:?}", part)))?;
                endpoints.push((host.to_string(), port));
            }
            Some(_) => return Err(Error::invalid(format!("invalid seed {:?}", part))),
            None => endpoints.push((part.to_string(), 6379)),
        }
    }
    if endpoints.is_empty() {
        return Err(Error::invalid("no seed endpoints"));
    }
    Ok(endpoints)
}

async fn discover_from(host: &str, port: u16) -> Result<Vec<NodeInfo>> {
    let mut conn = Connection::new(host, port, 0);
    conn.connect().await?;
    let reply = conn.round_trip(&command::cluster_nodes().to_frame()).await?;
    conn.close()?;
    match reply {
        Frame::Error(line) => Err(Error::redis(&line)),
        other => {
            let payload = other
                .into_bulk()
                .ok_or_else(|| Error::protocol("unexpected topology reply"))?;
            parse_cluster_nodes(&payload)
        }
    }
}
