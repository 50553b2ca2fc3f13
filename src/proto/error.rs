use std::io;

use thiserror::Error;

/// Result type alias for redlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client.
///
/// The taxonomy mirrors where a failure happened: establishing a socket
/// (`Connect`), using a live socket (`Connection`), the server rejecting a
/// command (`Redis`), a wire-level desync (`Protocol`), or caller misuse
/// (`InvalidArgument`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to establish a connection, including the post-connect
    /// database-select handshake.
    #[error("connect error: {message}")]
    Connect {
        /// Description of the failure.
        message: String,
    },

    /// A live connection was used after it closed, or a read/write failed
    /// mid-flight.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The server returned an error reply.
    #[error("server error: {message}")]
    Redis {
        /// Error message from the server, with a leading `ERR ` stripped.
        message: String,
    },

    /// The byte stream no longer parses as RESP.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// Caller misuse: empty pipeline, nested pipeline, invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the misuse.
        message: String,
    },

    /// Authentication failed.
    #[error("authentication failed")]
    Auth,
}

impl Error {
    /// Builds a connect error.
    pub(crate) fn connect(message: impl Into<String>) -> Self {
        Error::Connect {
            message: message.into(),
        }
    }

    /// Builds a connection error.
    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            message: message.into(),
        }
    }

    /// Builds a protocol error.
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    /// Builds a usage error.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    /// Builds a data-store error from an error reply line.
    ///
    /// The generic `ERR ` prefix carries no information and is stripped;
    /// specific prefixes (WRONGTYPE, NOAUTH, ...) are kept.
    pub(crate) fn redis(line: &[u8]) -> Self {
        let msg = String::from_utf8_lossy(line);
        let msg = msg.strip_prefix("ERR ").unwrap_or(&msg);
        Error::Redis {
            message: msg.to_string(),
        }
    }
}
