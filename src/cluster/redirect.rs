//! Classification of error replies that drive routing decisions.

/// What an error reply asks the cluster client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Redirect {
    /// The contacted node does not own the slot; retry against the named
    /// node.
    Moved {
        slot: u16,
        host: String,
        port: u16,
    },
    /// The node rejects writes; fail over to its master.
    ReadOnly,
    /// An ordinary server error, surfaced to the caller unchanged.
    None,
}

/// Classifies an error-reply line.
///
/// A `MOVED` line that does not parse cleanly is treated as an ordinary
/// error rather than guessed at.
pub(crate) fn classify(line: &[u8]) -> Redirect {
    if line.starts_with(b"READONLY") {
        return Redirect::ReadOnly;
    }
    if let Some(rest) = line.strip_prefix(b"MOVED ") {
        if let Some(moved) = parse_moved(rest) {
            return moved;
        }
    }
    Redirect::None
}

fn parse_moved(rest: &[u8]) -> Option<Redirect> {
    let text = std::str::from_utf8(rest).ok()?;
    let (slot, addr) = text.trim().split_once(' ')?;
    let slot = slot.parse().ok()?;
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some(Redirect::Moved {
        slot,
        host: host.to_string(),
        port: port.parse().ok()?,
    })
}
