use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::core::command;
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

/// A connection to one server node.
///
/// Owns the socket and the codec state for it; has no knowledge of command
/// semantics. A connection is either fully connected (stream held) or fully
/// disconnected (stream dropped); there is no partially-connected state a
/// caller can observe.
pub struct Connection {
    host: String,
    port: u16,
    database: u8,
    stream: Option<TcpStream>,
    decoder: Decoder,
    encoder: Encoder,
    ever_connected: bool,
}

impl Connection {
    /// Creates a disconnected connection for the given endpoint.
    pub fn new(host: impl Into<String>, port: u16, database: u8) -> Self {
        Self {
            host: host.into(),
            port,
            database,
            stream: None,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            ever_connected: false,
        }
    }

    /// The `host:port` label for this connection.
    pub fn name(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured database index.
    pub fn database(&self) -> u8 {
        self.database
    }

    /// Whether the connection currently holds a live socket.
    pub fn connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the socket and, for a non-default database, performs the
    /// `SELECT` handshake before declaring the connection ready.
    ///
    /// Any failure, including a rejected SELECT, tears the socket back
    /// down and surfaces as a connect error.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connected() {
            return Err(Error::connect("already connected"));
        }

        debug!(endpoint = %self.name(), "connecting");
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::connect(format!("{}: {}", self.name(), e)))?;
        self.stream = Some(stream);
        self.decoder = Decoder::new();
        self.ever_connected = true;

        if self.database != 0 {
            let select = command::select(self.database).to_frame();
            let reply = match self.round_trip(&select).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.stream = None;
                    return Err(Error::connect(format!("select handshake: {}", e)));
                }
            };
            if !reply.is_ok() {
                self.stream = None;
                return Err(Error::connect(format!(
                    "select {} rejected: {:?}",
                    self.database, reply
                )));
            }
        }
        Ok(())
    }

    /// Reconnects if the remote end dropped the socket since last use.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.connected() {
            return Ok(());
        }
        self.connect().await
    }

    /// Encodes and writes one frame.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.encoder.encode(frame);
        let data = self.encoder.take();
        self.write_raw(&data).await
    }

    /// Writes pre-encoded bytes, e.g. a flushed pipeline batch.
    pub async fn write_raw(&mut self, data: &BytesMut) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::connection("not connected"))?;
        if let Err(e) = stream.write_all(data).await {
            self.stream = None;
            return Err(Error::connection(format!("write failed: {}", e)));
        }
        Ok(())
    }

    /// Reads one complete reply, feeding the decoder until it produces a
    /// frame.
    ///
    /// EOF marks the connection disconnected and surfaces as a connection
    /// error so a pending command resolves instead of hanging.
    pub async fn read_reply(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(frame);
            }
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::connection("not connected"))?;
            let mut buf = [0u8; 4096];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    self.stream = None;
                    return Err(Error::connection(format!("read failed: {}", e)));
                }
            };
            if n == 0 {
                self.stream = None;
                return Err(Error::connection("connection closed"));
            }
            self.decoder.append(&buf[..n]);
        }
    }

    /// Writes one frame and reads its reply.
    pub async fn round_trip(&mut self, frame: &Frame) -> Result<Frame> {
        self.send(frame).await?;
        self.read_reply().await
    }

    /// Releases the socket.
    ///
    /// Closing a connection that was never opened is a connection error;
    /// closing one that already dropped is a no-op so shutdown paths stay
    /// idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.stream.is_none() {
            if self.ever_connected {
                return Ok(());
            }
            return Err(Error::connection("not connected"));
        }
        debug!(endpoint = %self.name(), "closing connection");
        self.stream = None;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.name())
            .field("database", &self.database)
            .field("connected", &self.connected())
            .finish()
    }
}
