use bytes::Bytes;

/// A RESP (REdis Serialization Protocol) frame.
///
/// Covers every reply type a RESP2 server produces:
/// - SimpleString: status replies like "OK"
/// - Error: error replies from the server
/// - Integer: numeric replies
/// - BulkString: binary-safe string data, `None` for the nil bulk (`$-1`)
/// - Array: multi-bulk replies (topology listings, scan results, commands)
/// - Null: the nil array (`*-1`)
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar). `None` is the nil bulk, not an empty string.
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null array (*-1).
    Null,
}

impl Frame {
    /// Returns true if this frame is the `+OK` status reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Frame::SimpleString(s) if s == b"OK")
    }

    /// Returns the integer value if this is an Integer frame.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Frame::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Consumes the frame and returns the bulk payload.
    ///
    /// Status replies convert to their line bytes; the nil bulk and the nil
    /// array both yield `None`, as does any non-string frame.
    pub fn into_bulk(self) -> Option<Bytes> {
        match self {
            Frame::BulkString(b) => b,
            Frame::SimpleString(s) => Some(Bytes::from(s)),
            _ => None,
        }
    }

    /// Returns true if this frame is a nil reply (`$-1` or `*-1`).
    pub fn is_nil(&self) -> bool {
        matches!(self, Frame::Null | Frame::BulkString(None))
    }

    /// Returns the error line if this is an Error frame.
    pub fn as_error(&self) -> Option<&[u8]> {
        match self {
            Frame::Error(e) => Some(e),
            _ => None,
        }
    }
}
