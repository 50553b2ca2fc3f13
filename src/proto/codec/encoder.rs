use bytes::{BufMut, BytesMut};

use crate::proto::frame::Frame;

/// A RESP encoder that converts [`Frame`] values to wire bytes.
///
/// The encoder accumulates into an internal buffer so several frames can be
/// encoded back to back and flushed as one write (the pipeline path relies
/// on this).
///
/// # Example
///
/// ```
/// use redlink::proto::codec::Encoder;
/// use redlink::proto::frame::Frame;
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Frame::SimpleString(b"OK".to_vec()));
/// assert_eq!(encoder.take().as_ref(), b"+OK\r\n");
/// ```
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Encodes a frame into the internal buffer.
    ///
    /// Nested arrays recurse with the same array-header rule, so a command
    /// built as an array of bulk strings encodes to the request wire format
    /// (`*N\r\n` then `$len\r\n<bytes>\r\n` per argument).
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => self.put_line(b'+', s),
            Frame::Error(e) => self.put_line(b'-', e),
            Frame::Integer(n) => self.put_line(b':', n.to_string().as_bytes()),
            Frame::BulkString(Some(data)) => {
                self.put_line(b'$', data.len().to_string().as_bytes());
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::BulkString(None) => self.buf.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                self.put_line(b'*', items.len().to_string().as_bytes());
                for item in items {
                    self.encode(item);
                }
            }
            Frame::Null => self.buf.extend_from_slice(b"*-1\r\n"),
        }
    }

    fn put_line(&mut self, tag: u8, payload: &[u8]) {
        self.buf.put_u8(tag);
        self.buf.extend_from_slice(payload);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Takes the encoded data from the buffer, leaving the encoder reusable.
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a single frame to wire bytes.
///
/// One-shot convenience over [`Encoder`] for callers that encode a command
/// at build time (pipeline capture, redirects).
pub fn encode_frame(frame: &Frame) -> BytesMut {
    let mut encoder = Encoder::new();
    encoder.encode(frame);
    encoder.take()
}
