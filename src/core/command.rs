use std::time::Duration;

use bytes::Bytes;

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// How a raw reply is coerced before it reaches the caller.
///
/// Captured on the command at build time so pipeline batches can apply it
/// per entry when the replies drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The reply must be the `+OK` status.
    Ok,
    /// An integer reply compared against an expected count.
    Count(i64),
}

/// The outcome of one executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The raw decoded frame.
    Frame(Frame),
    /// The result of an expectation comparison.
    Matched(bool),
    /// Placeholder returned while a pipeline batch is capturing; the real
    /// reply arrives in the `pipeline_execute` result list.
    Queued,
}

impl Reply {
    /// Returns the raw frame, if this reply carries one.
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Reply::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Applies a captured expectation to a decoded reply.
///
/// `Ok` compares against the `+OK` status. `Count(n)` with `n > 1` reports
/// `true` on an exact match but hands back the raw reply on a mismatch, so
/// a partial multi-key result (e.g. DEL hitting 2 of 3 keys) stays visible;
/// `Count(1)` reduces to the plain comparison.
pub(crate) fn apply_expectation(frame: Frame, expectation: Option<Expectation>) -> Reply {
    match expectation {
        None => Reply::Frame(frame),
        Some(Expectation::Ok) => Reply::Matched(frame.is_ok()),
        Some(Expectation::Count(expected)) => match frame.as_int() {
            Some(n) if n == expected => Reply::Matched(true),
            _ if expected > 1 => Reply::Frame(frame),
            _ => Reply::Matched(false),
        },
    }
}

/// A command ready to be sent to the server.
///
/// Built with the builder pattern and converted to a RESP array of bulk
/// strings for transmission. Integer and float arguments are rendered to
/// their decimal ASCII form as they are appended, so every argument is a
/// byte string by the time it hits the encoder.
///
/// # Example
///
/// ```
/// use redlink::core::command::{Cmd, Expectation};
///
/// let cmd = Cmd::new("SET").arg("key").arg("value").expect_reply(Expectation::Ok);
/// assert_eq!(cmd.key(), Some(&b"key"[..]));
/// ```
#[derive(Debug, Clone)]
pub struct Cmd {
    args: Vec<Bytes>,
    expectation: Option<Expectation>,
}

impl Cmd {
    /// Creates a new command with the given name.
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
            expectation: None,
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends an integer argument in its decimal ASCII form.
    #[inline]
    pub fn arg_int(self, arg: i64) -> Self {
        self.arg(arg.to_string())
    }

    /// Appends a float argument in its decimal ASCII form.
    #[inline]
    pub fn arg_float(self, arg: f64) -> Self {
        self.arg(arg.to_string())
    }

    /// Attaches a reply expectation, applied when the reply is decoded.
    #[inline]
    pub fn expect_reply(mut self, expectation: Expectation) -> Self {
        self.expectation = Some(expectation);
        self
    }

    /// The routing key: the first argument after the command name.
    ///
    /// Used by the cluster client to pick the owning node. Commands without
    /// a key argument (PING, INFO, ...) return `None` and route to any node.
    #[inline]
    pub fn key(&self) -> Option<&[u8]> {
        self.args.get(1).map(|b| b.as_ref())
    }

    /// The captured expectation, if any.
    #[inline]
    pub fn expectation(&self) -> Option<Expectation> {
        self.expectation
    }

    /// Converts the command to a RESP array frame.
    #[inline]
    pub fn to_frame(&self) -> Frame {
        Frame::Array(
            self.args
                .iter()
                .map(|b| Frame::BulkString(Some(b.clone())))
                .collect(),
        )
    }
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates an ECHO command.
#[inline]
pub fn echo(msg: impl Into<Bytes>) -> Cmd {
    Cmd::new("ECHO").arg(msg)
}

/// Creates a GET command.
#[inline]
pub fn get(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SET").arg(key).arg(value).expect_reply(Expectation::Ok)
}

/// Creates a SET command with an expiration.
#[inline]
pub fn set_with_expiry(
    key: impl Into<Bytes>,
    value: impl Into<Bytes>,
    expiry: Duration,
) -> Cmd {
    Cmd::new("SET")
        .arg(key)
        .arg(value)
        .arg("EX")
        .arg_int(expiry.as_secs() as i64)
        .expect_reply(Expectation::Ok)
}

/// Creates a SETNX command.
#[inline]
pub fn setnx(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SETNX").arg(key).arg(value)
}

/// Creates a DEL command over one or more keys, expecting the full count.
#[inline]
pub fn del<T: Into<Bytes>>(keys: impl IntoIterator<Item = T>) -> Cmd {
    let mut cmd = Cmd::new("DEL");
    let mut count = 0i64;
    for key in keys {
        cmd = cmd.arg(key);
        count += 1;
    }
    cmd.expect_reply(Expectation::Count(count))
}

/// Creates an EXISTS command over one or more keys.
#[inline]
pub fn exists<T: Into<Bytes>>(keys: impl IntoIterator<Item = T>) -> Cmd {
    let mut cmd = Cmd::new("EXISTS");
    for key in keys {
        cmd = cmd.arg(key);
    }
    cmd
}

/// Creates an INCR command.
#[inline]
pub fn incr(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("INCR").arg(key)
}

/// Creates an INCRBY command.
#[inline]
pub fn incr_by(key: impl Into<Bytes>, amount: i64) -> Cmd {
    Cmd::new("INCRBY").arg(key).arg_int(amount)
}

/// Creates a DECR command.
#[inline]
pub fn decr(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DECR").arg(key)
}

/// Creates an EXPIRE command.
#[inline]
pub fn expire(key: impl Into<Bytes>, seconds: u64) -> Cmd {
    Cmd::new("EXPIRE").arg(key).arg_int(seconds as i64)
}

/// Creates a TTL command.
#[inline]
pub fn ttl(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("TTL").arg(key)
}

/// Creates an AUTH command.
#[inline]
pub fn auth(password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates a SELECT command.
#[inline]
pub fn select(db: u8) -> Cmd {
    Cmd::new("SELECT").arg_int(db as i64)
}

/// Creates an INFO REPLICATION command.
#[inline]
pub fn info_replication() -> Cmd {
    Cmd::new("INFO").arg("REPLICATION")
}

/// Creates a CLUSTER NODES command.
#[inline]
pub fn cluster_nodes() -> Cmd {
    Cmd::new("CLUSTER").arg("NODES")
}

/// Creates a WAIT command.
///
/// The timeout is caller-supplied and forwarded verbatim to the server;
/// the client itself imposes no deadline on the acknowledgement.
#[inline]
pub fn wait(num_replicas: u32, timeout: Duration) -> Cmd {
    Cmd::new("WAIT")
        .arg_int(num_replicas as i64)
        .arg_int(timeout.as_millis() as i64)
}

/// Converts a reply frame to its bulk payload, treating nil as `None`.
pub(crate) fn frame_to_bytes(frame: Frame) -> Result<Option<Bytes>> {
    match frame {
        Frame::Error(e) => Err(Error::redis(&e)),
        Frame::BulkString(b) => Ok(b),
        Frame::Null => Ok(None),
        Frame::SimpleString(s) => Ok(Some(Bytes::from(s))),
        other => Err(Error::protocol(format!(
            "expected bulk string reply, got {:?}",
            other
        ))),
    }
}

/// Converts a reply frame to an integer.
pub(crate) fn frame_to_int(frame: Frame) -> Result<i64> {
    match frame {
        Frame::Error(e) => Err(Error::redis(&e)),
        Frame::Integer(n) => Ok(n),
        other => Err(Error::protocol(format!(
            "expected integer reply, got {:?}",
            other
        ))),
    }
}

/// Requires a `+OK` status reply.
pub(crate) fn frame_ok(frame: Frame) -> Result<()> {
    match frame {
        Frame::Error(e) => Err(Error::redis(&e)),
        frame if frame.is_ok() => Ok(()),
        other => Err(Error::protocol(format!(
            "expected OK reply, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_to_frame() {
        let frame = Cmd::new("GET").arg("foo").to_frame();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::BulkString(Some(Bytes::from("GET"))),
                Frame::BulkString(Some(Bytes::from("foo"))),
            ])
        );
    }

    #[test]
    fn test_cmd_key_is_first_argument() {
        assert_eq!(get("foo").key(), Some(&b"foo"[..]));
        assert_eq!(ping().key(), None);
    }

    #[test]
    fn test_cmd_int_args_render_decimal() {
        let frame = incr_by("counter", -5).to_frame();
        match frame {
            Frame::Array(args) => {
                assert_eq!(args[2], Frame::BulkString(Some(Bytes::from("-5"))));
            }
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn test_del_captures_key_count() {
        let cmd = del(["a", "b", "c"]);
        assert_eq!(cmd.expectation(), Some(Expectation::Count(3)));
    }

    #[test]
    fn test_apply_expectation_ok() {
        let reply = apply_expectation(Frame::SimpleString(b"OK".to_vec()), Some(Expectation::Ok));
        assert_eq!(reply, Reply::Matched(true));

        let reply = apply_expectation(Frame::Integer(0), Some(Expectation::Ok));
        assert_eq!(reply, Reply::Matched(false));
    }

    #[test]
    fn test_apply_expectation_count_exact_match() {
        let reply = apply_expectation(Frame::Integer(3), Some(Expectation::Count(3)));
        assert_eq!(reply, Reply::Matched(true));
    }

    #[test]
    fn test_apply_expectation_count_mismatch_keeps_raw_reply() {
        // DEL over 3 keys that removed 2: the caller sees the real count.
        let reply = apply_expectation(Frame::Integer(2), Some(Expectation::Count(3)));
        assert_eq!(reply, Reply::Frame(Frame::Integer(2)));
    }

    #[test]
    fn test_apply_expectation_count_one_is_boolean() {
        let reply = apply_expectation(Frame::Integer(0), Some(Expectation::Count(1)));
        assert_eq!(reply, Reply::Matched(false));
    }

    #[test]
    fn test_apply_expectation_none_passes_frame_through() {
        let reply = apply_expectation(Frame::Integer(9), None);
        assert_eq!(reply, Reply::Frame(Frame::Integer(9)));
    }

    #[test]
    fn test_frame_to_bytes_nil_is_none() {
        assert_eq!(frame_to_bytes(Frame::BulkString(None)).unwrap(), None);
        assert_eq!(frame_to_bytes(Frame::Null).unwrap(), None);
    }

    #[test]
    fn test_frame_to_int_rejects_bulk() {
        assert!(frame_to_int(Frame::BulkString(None)).is_err());
        assert_eq!(frame_to_int(Frame::Integer(5)).unwrap(), 5);
    }

    #[test]
    fn test_frame_shapers_propagate_server_errors() {
        let err = frame_ok(Frame::Error(b"ERR no good".to_vec())).unwrap_err();
        assert!(matches!(err, Error::Redis { .. }));
    }

    #[test]
    fn test_wait_forwards_timeout_verbatim() {
        let frame = wait(2, Duration::from_millis(1500)).to_frame();
        match frame {
            Frame::Array(args) => {
                assert_eq!(args[1], Frame::BulkString(Some(Bytes::from("2"))));
                assert_eq!(args[2], Frame::BulkString(Some(Bytes::from("1500"))));
            }
            _ => panic!("expected array"),
        }
    }
}
