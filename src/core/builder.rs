use crate::core::{Client, OnClose, Result};

/// Builder for a [`Client`] with explicit endpoint configuration.
///
/// # Example
///
/// ```no_run
/// use redlink::ClientBuilder;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ClientBuilder::new()
///         .host("10.0.0.5")
///         .port(6380)
///         .database(3)
///         .build()
///         .await?;
///     client.ping().await?;
///     Ok(())
/// }
/// ```
pub struct ClientBuilder {
    host: String,
    port: u16,
    database: u8,
    on_close: Option<OnClose>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            on_close: None,
        }
    }

    /// Server hostname or IP address. Defaults to `127.0.0.1`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Server port. Defaults to `6379`.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Logical database selected on connect. Defaults to `0`.
    pub fn database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// Callback invoked when the server drops the connection unexpectedly.
    pub fn on_close(mut self, on_close: OnClose) -> Self {
        self.on_close = Some(on_close);
        self
    }

    /// Builds the client and connects eagerly, so configuration problems
    /// surface here rather than on the first command.
    pub async fn build(self) -> Result<Client> {
        let client = Client::from_parts(self.host, self.port, self.database, self.on_close);
        client.shared.connection.lock().await.connect().await?;
        Ok(client)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::error::Error;

    #[tokio::test]
    async fn test_build_fails_eagerly_when_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ClientBuilder::new()
            .host(addr.ip().to_string())
            .port(addr.port())
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }
}
