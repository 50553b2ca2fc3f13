//! Core connection handling and the command execution engine.
//!
//! ## Modules
//!
//! - [`connection`] - Single-socket connection management
//! - [`command`] - Command builders and reply shaping
//! - [`builder`] - Client builder
//! - [`pipeline`] - Pipeline batch capture

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub use crate::proto::error::{Error, Result};
use crate::proto::codec::encode_frame;
use crate::proto::frame::Frame;

/// Client builder configuration.
pub mod builder;
/// Command construction and reply shaping.
pub mod command;
/// Low-level connection management.
pub mod connection;

pub(crate) mod info;
pub(crate) mod pipeline;

use command::{apply_expectation, Cmd, Reply};
use connection::Connection;
use pipeline::Pipeline;

/// Close-notification callback, invoked when the remote end drops the
/// connection unexpectedly.
pub type OnClose = Arc<dyn Fn() + Send + Sync>;

/// Asynchronous client for a single server node.
///
/// Cheap to clone; all clones share one connection and one execution lock,
/// so at most one command is in flight at a time and request/response
/// pairing stays correct on a protocol without request identifiers.
///
/// # Example
///
/// ```no_run
/// use redlink::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::connect("redis://localhost:6379").await?;
///     client.set("foo", "bar".into()).await?;
///     let value = client.get("foo").await?;
///     assert_eq!(value.as_deref(), Some(&b"bar"[..]));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

struct Shared {
    /// The execution lock: held from before the write until the reply
    /// (including failover recovery) is fully resolved.
    connection: Mutex<Connection>,
    /// Active pipeline batch, if one is capturing.
    pipeline: StdMutex<Option<Pipeline>>,
    on_close: Option<OnClose>,
}

impl Client {
    pub(crate) fn from_parts(
        host: String,
        port: u16,
        database: u8,
        on_close: Option<OnClose>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connection: Mutex::new(Connection::new(host, port, database)),
                pipeline: StdMutex::new(None),
                on_close,
            }),
        }
    }

    /// Connects using a `redis://host:port[/db]` connect string.
    pub async fn connect<T: AsRef<str>>(addr: T) -> Result<Self> {
        let parsed = url::Url::parse(addr.as_ref())
            .map_err(|_| Error::invalid("invalid address format"))?;
        if parsed.scheme() != "redis" {
            return Err(Error::invalid("invalid scheme, expected redis://"));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::invalid("missing host in address"))?
            .to_string();
        let port = parsed.port().unwrap_or(6379);
        let database = match parsed.path().trim_start_matches('/') {
            "" => 0,
            db => db
                .parse::<u8>()
                .map_err(|_| Error::invalid("invalid database index in address"))?,
        };

        let client = Self::from_parts(host, port, database, None);
        client.shared.connection.lock().await.connect().await?;
        Ok(client)
    }

    /// Executes a command, returning its (optionally coerced) reply.
    ///
    /// While a pipeline batch is capturing, the command is appended to the
    /// batch with no I/O and [`Reply::Queued`] is returned; the real reply
    /// arrives in the [`pipeline_execute`](Client::pipeline_execute) result
    /// list. A `READONLY` rejection triggers a transparent failover to the
    /// advertised master and a single re-execution.
    pub async fn execute(&self, cmd: Cmd) -> Result<Reply> {
        let expectation = cmd.expectation();
        let frame = cmd.to_frame();

        if let Some(batch) = self.pipeline_lock().as_mut() {
            batch.push(encode_frame(&frame), expectation);
            return Ok(Reply::Queued);
        }

        let mut conn = self.shared.connection.lock().await;
        let reply = self.dispatch(&mut conn, &frame).await?;
        Ok(apply_expectation(reply, expectation))
    }

    /// Executes a command and hands back the raw reply frame.
    ///
    /// Typed convenience methods use this path; they cannot return capture
    /// placeholders, so calling them while a pipeline is active is a usage
    /// error.
    async fn execute_frame(&self, cmd: &Cmd) -> Result<Frame> {
        if self.pipeline_lock().is_some() {
            return Err(Error::invalid(
                "pipeline is capturing; use execute() for pipelined commands",
            ));
        }
        let mut conn = self.shared.connection.lock().await;
        self.dispatch(&mut conn, &cmd.to_frame()).await
    }

    /// The base execute path: connect lazily, write, read, and resolve
    /// read-only failover. Runs with the execution lock held.
    async fn dispatch(&self, conn: &mut Connection, frame: &Frame) -> Result<Frame> {
        conn.ensure_connected().await?;
        debug!(endpoint = %conn.name(), "dispatching command");
        let reply = self.round_trip(conn, frame).await?;
        match reply {
            Frame::Error(line) if line.starts_with(b"READONLY") => {
                warn!(endpoint = %conn.name(), "node is read-only, failing over");
                self.failover(conn).await?;
                match self.round_trip(conn, frame).await? {
                    Frame::Error(line) => Err(Error::redis(&line)),
                    other => Ok(other),
                }
            }
            Frame::Error(line) => Err(Error::redis(&line)),
            other => Ok(other),
        }
    }

    async fn round_trip(&self, conn: &mut Connection, frame: &Frame) -> Result<Frame> {
        match conn.round_trip(frame).await {
            Err(e) => {
                if matches!(e, Error::Connection { .. }) {
                    self.notify_close();
                }
                Err(e)
            }
            ok => ok,
        }
    }

    /// Fails over to the master advertised by the current (read-only)
    /// connection.
    ///
    /// The replication query runs on the old connection; the old connection
    /// is then closed exactly once and replaced by a fresh one to the
    /// master, carrying over the database index. A failed query or a reply
    /// without a master address surfaces as a connect error.
    async fn failover(&self, conn: &mut Connection) -> Result<()> {
        let reply = conn
            .round_trip(&command::info_replication().to_frame())
            .await
            .map_err(|e| Error::connect(format!("replication query failed: {}", e)))?;
        let payload = reply
            .into_bulk()
            .ok_or_else(|| Error::connect("unexpected replication info reply"))?;
        let (host, port) = info::master_address(&info::parse_info(&payload))
            .ok_or_else(|| Error::connect("no master address in replication info"))?;

        warn!(master = %format!("{}:{}", host, port), "reconnecting to master");
        let database = conn.database();
        conn.close()?;
        *conn = Connection::new(host, port, database);
        conn.connect().await
    }

    fn pipeline_lock(&self) -> MutexGuard<'_, Option<Pipeline>> {
        self.shared
            .pipeline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify_close(&self) {
        if let Some(on_close) = &self.shared.on_close {
            on_close();
        }
    }

    /// Begins capturing commands into a pipeline batch.
    ///
    /// Subsequent [`execute`](Client::execute) calls are captured instead
    /// of sent. Nesting is not supported.
    pub fn pipeline_start(&self) -> Result<()> {
        let mut pipeline = self.pipeline_lock();
        if pipeline.is_some() {
            return Err(Error::invalid("pipeline already started"));
        }
        *pipeline = Some(Pipeline::new());
        Ok(())
    }

    /// Flushes the captured batch as one write and drains one reply per
    /// entry, in issue order.
    ///
    /// Each entry resolves independently: an error reply on entry *k* is
    /// stored as that entry's result and does not abort the entries after
    /// it. The execution lock is held for the whole flush and drain so no
    /// other command can interleave on the connection. A transport failure
    /// mid-drain fails the whole call.
    pub async fn pipeline_execute(&self) -> Result<Vec<Result<Reply>>> {
        let batch = self
            .pipeline_lock()
            .take()
            .ok_or_else(|| Error::invalid("no pipeline started"))?;
        if batch.is_empty() {
            return Err(Error::invalid("empty pipeline"));
        }

        let mut conn = self.shared.connection.lock().await;
        conn.ensure_connected().await?;
        debug!(entries = batch.len(), "flushing pipeline");
        conn.write_raw(&batch.flush_bytes()).await?;

        let entries = batch.into_entries();
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let frame = match conn.read_reply().await {
                Ok(frame) => frame,
                Err(e) => {
                    if matches!(e, Error::Connection { .. }) {
                        self.notify_close();
                    }
                    return Err(e);
                }
            };
            results.push(match frame {
                Frame::Error(line) => Err(Error::redis(&line)),
                other => Ok(apply_expectation(other, entry.expectation)),
            });
        }
        Ok(results)
    }

    /// Sends a PING and returns the `PONG` payload.
    pub async fn ping(&self) -> Result<Bytes> {
        let frame = self.execute_frame(&command::ping()).await?;
        frame
            .into_bulk()
            .ok_or_else(|| Error::protocol("unexpected PING reply"))
    }

    /// Echoes a message back from the server.
    pub async fn echo(&self, msg: impl Into<Bytes>) -> Result<Bytes> {
        let frame = self.execute_frame(&command::echo(msg)).await?;
        Ok(frame.into_bulk().unwrap_or_default())
    }

    /// Gets the value of a key, `None` if it does not exist.
    pub async fn get(&self, key: impl Into<Bytes>) -> Result<Option<Bytes>> {
        let frame = self.execute_frame(&command::get(key)).await?;
        command::frame_to_bytes(frame)
    }

    /// Sets the value of a key.
    pub async fn set(&self, key: impl Into<Bytes>, value: Bytes) -> Result<()> {
        let frame = self.execute_frame(&command::set(key, value)).await?;
        command::frame_ok(frame)
    }

    /// Sets the value of a key with an expiration time.
    pub async fn set_with_expiry(
        &self,
        key: impl Into<Bytes>,
        value: Bytes,
        expiry: Duration,
    ) -> Result<()> {
        let cmd = command::set_with_expiry(key, value, expiry);
        let frame = self.execute_frame(&cmd).await?;
        command::frame_ok(frame)
    }

    /// Sets a key only if it does not exist; true when the key was set.
    pub async fn setnx(&self, key: impl Into<Bytes>, value: Bytes) -> Result<bool> {
        let frame = self.execute_frame(&command::setnx(key, value)).await?;
        Ok(command::frame_to_int(frame)? == 1)
    }

    /// Deletes keys, returning how many existed.
    pub async fn del<T: Into<Bytes>>(
        &self,
        keys: impl IntoIterator<Item = T>,
    ) -> Result<i64> {
        let frame = self.execute_frame(&command::del(keys)).await?;
        command::frame_to_int(frame)
    }

    /// Returns how many of the given keys exist.
    pub async fn exists<T: Into<Bytes>>(
        &self,
        keys: impl IntoIterator<Item = T>,
    ) -> Result<i64> {
        let frame = self.execute_frame(&command::exists(keys)).await?;
        command::frame_to_int(frame)
    }

    /// Increments a key by one, returning the new value.
    pub async fn incr(&self, key: impl Into<Bytes>) -> Result<i64> {
        let frame = self.execute_frame(&command::incr(key)).await?;
        command::frame_to_int(frame)
    }

    /// Increments a key by `amount`, returning the new value.
    pub async fn incr_by(&self, key: impl Into<Bytes>, amount: i64) -> Result<i64> {
        let frame = self.execute_frame(&command::incr_by(key, amount)).await?;
        command::frame_to_int(frame)
    }

    /// Decrements a key by one, returning the new value.
    pub async fn decr(&self, key: impl Into<Bytes>) -> Result<i64> {
        let frame = self.execute_frame(&command::decr(key)).await?;
        command::frame_to_int(frame)
    }

    /// Sets a key's time to live in seconds; true when the timer was set.
    pub async fn expire(&self, key: impl Into<Bytes>, seconds: u64) -> Result<bool> {
        let frame = self.execute_frame(&command::expire(key, seconds)).await?;
        Ok(command::frame_to_int(frame)? == 1)
    }

    /// Returns a key's remaining time to live in seconds.
    pub async fn ttl(&self, key: impl Into<Bytes>) -> Result<i64> {
        let frame = self.execute_frame(&command::ttl(key)).await?;
        command::frame_to_int(frame)
    }

    /// Authenticates with a password.
    pub async fn auth(&self, password: impl Into<Bytes>) -> Result<()> {
        let frame = self.execute_frame(&command::auth(password)).await?;
        match command::frame_ok(frame) {
            Err(Error::Redis { message })
                if message.contains("invalid password")
                    || message.starts_with("WRONGPASS") =>
            {
                Err(Error::Auth)
            }
            other => other,
        }
    }

    /// Selects the logical database for the connection.
    pub async fn select(&self, db: u8) -> Result<()> {
        let frame = self.execute_frame(&command::select(db)).await?;
        command::frame_ok(frame)
    }

    /// Blocks the server until writes reach `num_replicas` replicas or the
    /// given timeout elapses; the timeout is forwarded verbatim.
    pub async fn wait(&self, num_replicas: u32, timeout: Duration) -> Result<i64> {
        let cmd = command::wait(num_replicas, timeout);
        let frame = self.execute_frame(&cmd).await?;
        command::frame_to_int(frame)
    }

    /// Whether the underlying connection is currently established.
    pub async fn is_connected(&self) -> bool {
        self.shared.connection.lock().await.connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<()> {
        self.shared.connection.lock().await.close()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_start_twice_is_usage_error() {
        let client = Client::from_parts("127.0.0.1".into(), 6379, 0, None);
        client.pipeline_start().unwrap();
        let err = client.pipeline_start().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_pipeline_execute_without_start_is_usage_error() {
        let client = Client::from_parts("127.0.0.1".into(), 6379, 0, None);
        let err = client.pipeline_execute().await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_empty_pipeline_execute_is_usage_error() {
        let client = Client::from_parts("127.0.0.1".into(), 6379, 0, None);
        client.pipeline_start().unwrap();
        let err = client.pipeline_execute().await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_execute_captures_while_pipeline_active() {
        // No server needed: capture must not touch the network.
        let client = Client::from_parts("127.0.0.1".into(), 1, 0, None);
        client.pipeline_start().unwrap();
        let reply = client.execute(command::ping()).await.unwrap();
        assert_eq!(reply, Reply::Queued);
    }

    #[tokio::test]
    async fn test_typed_method_during_capture_is_usage_error() {
        let client = Client::from_parts("127.0.0.1".into(), 1, 0, None);
        client.pipeline_start().unwrap();
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_scheme() {
        let err = Client::connect("http://localhost:6379").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_connect_parses_database_from_path() {
        // Parse failure keeps us off the network entirely.
        let err = Client::connect("redis://localhost:6379/notadb")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
