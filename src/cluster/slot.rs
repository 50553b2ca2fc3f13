//! Cluster hash-slot calculation.
//!
//! Redis Cluster maps every key to one of 16384 slots with CRC16 and each
//! node owns a subset of the slot space. The checksum parameters here must
//! match the server bit-for-bit or keys route to the wrong node.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC-16/XMODEM: polynomial 0x1021, init 0x0000, unreflected, no final XOR.
/// These are the exact parameters the server uses for slot assignment.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculates the cluster slot for a key.
///
/// The checksum runs over the raw key bytes, reduced modulo [`SLOT_COUNT`].
/// If the key contains a non-empty `{...}` section, only the bytes between
/// the first `{` and the following `}` are hashed (hash tags), so related
/// keys can be pinned to one slot.
///
/// # Examples
///
/// ```
/// use redlink::cluster::key_slot;
///
/// assert_eq!(key_slot(b"123456789"), 0x31c3 % 16384);
/// assert_eq!(key_slot(b"{user1000}.following"), key_slot(b"{user1000}.followers"));
/// ```
pub fn key_slot(key: &[u8]) -> u16 {
    let hash_key = extract_hash_tag(key);
    CRC16.checksum(hash_key) % SLOT_COUNT
}

/// Extracts the hash tag from a key, or returns the whole key when no
/// non-empty `{...}` section exists.
fn extract_hash_tag(key: &[u8]) -> &[u8] {
    if let Some(start) = key.iter().position(|&b| b == b'{') {
        if let Some(len) = key[start + 1..].iter().position(|&b| b == b'}') {
            if len > 0 {
                return &key[start + 1..start + 1 + len];
            }
        }
    }
    key
}
