//! Parsing for `INFO`-style replies.
//!
//! The reply is a bulk string of newline-separated `key:value` lines with
//! `#` section headers. The failover path only needs `master_host` and
//! `master_port`, but the full map is parsed so callers can inspect any
//! replication field.

use std::collections::HashMap;

/// Parses an INFO payload into a key/value map.
///
/// Section headers and blank lines are skipped; lines without a `:` are
/// ignored.
pub(crate) fn parse_info(payload: &[u8]) -> HashMap<String, String> {
    let mut info = HashMap::new();
    for line in String::from_utf8_lossy(payload).lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            info.insert(key.to_string(), value.to_string());
        }
    }
    info
}

/// Extracts the advertised master address from a replication INFO map.
pub(crate) fn master_address(info: &HashMap<String, String>) -> Option<(String, u16)> {
    let host = info.get("master_host")?.clone();
    let port = info.get("master_port")?.parse::<u16>().ok()?;
    Some((host, port))
}
