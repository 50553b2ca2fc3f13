use bytes::{Buf, Bytes, BytesMut};

use crate::proto::error::Error;
use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default

/// A streaming RESP decoder.
///
/// Feed bytes with [`append`](Decoder::append) as they arrive, then call
/// [`decode`](Decoder::decode). `Ok(None)` means the buffer does not yet
/// hold a complete reply; append more bytes and retry. The buffer is only
/// consumed once a complete top-level frame (including every nested array
/// element) has been parsed, so a retry never re-reads or loses bytes.
///
/// # Example
///
/// ```
/// use redlink::proto::codec::Decoder;
/// use redlink::proto::frame::Frame;
///
/// let mut decoder = Decoder::new();
/// decoder.append(b"+OK\r\n");
/// let frame = decoder.decode().unwrap().unwrap();
/// assert_eq!(frame, Frame::SimpleString(b"OK".to_vec()));
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder with a custom maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Appends raw bytes to the internal buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempts to decode one complete frame from the buffer.
    ///
    /// Returns `Ok(Some(Frame))` and consumes the frame's bytes, `Ok(None)`
    /// when more data is needed (nothing consumed), or `Err` on a malformed
    /// stream. An unknown type tag is fatal: the stream is desynchronized
    /// and no further reply boundary can be trusted.
    pub fn decode(&mut self) -> Result<Option<Frame>, Error> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let mut pos = 0;
        match self.parse(&mut pos)? {
            Some(frame) => {
                self.buf.advance(pos);
                Ok(Some(frame))
            }
            None => {
                if self.buf.len() > self.max_frame_size {
                    return Err(Error::protocol("frame exceeds maximum size"));
                }
                Ok(None)
            }
        }
    }

    /// Parses one frame starting at `pos` without consuming the buffer.
    ///
    /// On success `pos` points just past the frame; on `None` (incomplete)
    /// the caller discards `pos` entirely.
    fn parse(&self, pos: &mut usize) -> Result<Option<Frame>, Error> {
        let tag = match self.buf.get(*pos) {
            Some(tag) => *tag,
            None => return Ok(None),
        };
        *pos += 1;

        match tag {
            b'+' => Ok(self.parse_line(pos)?.map(Frame::SimpleString)),
            b'-' => Ok(self.parse_line(pos)?.map(Frame::Error)),
            b':' => {
                let line = match self.parse_line(pos)? {
                    Some(line) => line,
                    None => return Ok(None),
                };
                Ok(Some(Frame::Integer(parse_int(&line)?)))
            }
            b'$' => self.parse_bulk(pos),
            b'*' => self.parse_array(pos),
            other => Err(Error::protocol(format!(
                "unknown frame type: {:?}",
                other as char
            ))),
        }
    }

    fn parse_bulk(&self, pos: &mut usize) -> Result<Option<Frame>, Error> {
        let line = match self.parse_line(pos)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let len = parse_int(&line)?;

        if len == -1 {
            return Ok(Some(Frame::BulkString(None)));
        }
        if len < 0 {
            return Err(Error::protocol("negative bulk length"));
        }

        let len = len as usize;
        if len > self.max_frame_size {
            return Err(Error::protocol("bulk string exceeds maximum frame size"));
        }

        // Payload plus trailing CRLF.
        if self.buf.len() < *pos + len + 2 {
            return Ok(None);
        }
        let data = Bytes::copy_from_slice(&self.buf[*pos..*pos + len]);
        *pos += len + 2;
        Ok(Some(Frame::BulkString(Some(data))))
    }

    fn parse_array(&self, pos: &mut usize) -> Result<Option<Frame>, Error> {
        let line = match self.parse_line(pos)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let count = parse_int(&line)?;

        if count == -1 {
            return Ok(Some(Frame::Null));
        }
        if count < 0 {
            return Err(Error::protocol("negative array length"));
        }

        let count = count as usize;
        if count > self.max_frame_size / 16 {
            return Err(Error::protocol("array length exceeds maximum"));
        }

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            match self.parse(pos)? {
                Some(frame) => items.push(frame),
                None => return Ok(None),
            }
        }
        Ok(Some(Frame::Array(items)))
    }

    /// Reads the bytes from `pos` up to the next CRLF, advancing past it.
    fn parse_line(&self, pos: &mut usize) -> Result<Option<Vec<u8>>, Error> {
        let start = *pos;
        let mut i = start;
        while i + 1 < self.buf.len() {
            if self.buf[i] == b'\r' && self.buf[i + 1] == b'\n' {
                *pos = i + 2;
                return Ok(Some(self.buf[start..i].to_vec()));
            }
            i += 1;
        }
        Ok(None)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_int(line: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::protocol("invalid integer line"))
}
