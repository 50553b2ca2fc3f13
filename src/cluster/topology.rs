//! Parsing for the `CLUSTER NODES` topology reply.
//!
//! One line per node:
//!
//! ```text
//! <id> <ip:port[@cport]> <flags> <master-id|-> <ping_sent> <pong_recv> <config_epoch> <link_state> [<slot|start-end> ...]
//! ```

use tracing::warn;

use crate::proto::error::{Error, Result};

/// Role and liveness markers parsed from a node's flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    pub master: bool,
    pub replica: bool,
    pub myself: bool,
    pub failing: bool,
    pub handshake: bool,
    pub noaddr: bool,
}

impl NodeFlags {
    fn parse(field: &str) -> Self {
        let mut flags = Self::default();
        for token in field.split(',') {
            match token {
                "master" => flags.master = true,
                "slave" | "replica" => flags.replica = true,
                "myself" => flags.myself = true,
                "fail" | "fail?" => flags.failing = true,
                "handshake" => flags.handshake = true,
                "noaddr" => flags.noaddr = true,
                _ => {}
            }
        }
        flags
    }
}

/// One node as described by a topology discovery line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub flags: NodeFlags,
    /// The master this node replicates, if it is a replica.
    pub master_id: Option<String>,
    pub ping_sent: u64,
    pub pong_recv: u64,
    pub config_epoch: u64,
    pub link_connected: bool,
    /// Inclusive slot ranges owned by this node.
    pub slots: Vec<(u16, u16)>,
}

impl NodeInfo {
    /// The `host:port` table key for this node.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn owns_slot(&self, slot: u16) -> bool {
        self.slots.iter().any(|&(start, end)| slot >= start && slot <= end)
    }

    /// A placeholder entry for a node learned from a redirect rather than
    /// discovery; carries no slot ownership until the next refresh.
    pub(crate) fn ephemeral(host: String, port: u16) -> Self {
        Self {
            id: String::new(),
            host,
            port,
            flags: NodeFlags {
                master: true,
                ..NodeFlags::default()
            },
            master_id: None,
            ping_sent: 0,
            pong_recv: 0,
            config_epoch: 0,
            link_connected: true,
            slots: Vec::new(),
        }
    }
}

/// Parses a full `CLUSTER NODES` payload.
///
/// Malformed lines are skipped with a warning rather than failing the whole
/// discovery; slot-migration tokens (`[...]`) are ignored.
pub fn parse_cluster_nodes(payload: &[u8]) -> Result<Vec<NodeInfo>> {
    let text = String::from_utf8_lossy(payload);
    let mut nodes = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_node_line(line) {
            Some(node) => nodes.push(node),
            None => warn!(line, "skipping malformed topology line"),
        }
    }
    if nodes.is_empty() {
        return Err(Error::protocol("empty cluster topology"));
    }
    Ok(nodes)
}

fn parse_node_line(line: &str) -> Option<NodeInfo> {
    let mut fields = line.split_whitespace();
    let id = fields.next()?.to_string();
    let (host, port) = parse_addr(fields.next()?)?;
    let flags = NodeFlags::parse(fields.next()?);
    let master_id = match fields.next()? {
        "-" => None,
        id => Some(id.to_string()),
    };
    let ping_sent = fields.next()?.parse().ok()?;
    let pong_recv = fields.next()?.parse().ok()?;
    let config_epoch = fields.next()?.parse().ok()?;
    let link_connected = fields.next()? == "connected";

    let mut slots = Vec::new();
    for token in fields {
        if token.starts_with('[') {
            // Migration marker, not an owned range.
            continue;
        }
        slots.push(parse_slot_token(token)?);
    }

    Some(NodeInfo {
        id,
        host,
        port,
        flags,
        master_id,
        ping_sent,
        pong_recv,
        config_epoch,
        link_connected,
        slots,
    })
}

/// Splits `ip:port` or `ip:port@cport` into its client-facing parts.
fn parse_addr(field: &str) -> Option<(String, u16)> {
    let client_part = field.split('@').next()?;
    let (host, port) = client_part.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}

fn parse_slot_token(token: &str) -> Option<(u16, u16)> {
    match token.split_once('-') {
        Some((start, end)) => {
            let start = start.parse().ok()?;
            let end = end.parse().ok()?;
            (start <= end).then_some((start, end))
        }
        None => {
            let slot = token.parse().ok()?;
            Some((slot, slot))
        }
    }
}
