use std::fmt;

/// A RESP error kind, the first whitespace-separated token of a `-` reply
/// (`ERR`, `WRONGTYPE`, `NOAUTH`, `MOVED`, `WRONGPASS`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorKind(pub String);

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ErrorKind {
    fn from(s: &str) -> Self {
        ErrorKind(s.to_owned())
    }
}

/// The client's closed error taxonomy (spec §7).
///
/// Callers are expected to match on variant, not just display the message:
/// `ServerError`/`UnexpectedResponse` leave the connection `Ready`; every
/// other variant is connection-scoped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The codec could not parse the byte stream. Always closes the connection.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A `-...` reply from the server. Local to one request; connection stays `Ready`.
    #[error("server error {kind}: {message}")]
    ServerError { kind: ErrorKind, message: String },

    /// The decoder rejected a well-formed RESP value as not matching the command's
    /// expected reply shape. Connection stays `Ready`.
    #[error("unexpected response for command {command}: {value:?}")]
    UnexpectedResponse {
        command: &'static str,
        value: crate::resp::Value,
    },

    /// Submission after shutdown, or a pending non-idempotent request lost to a drop.
    #[error("connection closed")]
    ConnectionClosed,

    /// Submission refused: the pending queue or send buffer is at its configured cap.
    #[error("backpressure exceeded")]
    BackpressureExceeded,

    /// `receive_timeout` elapsed locally before a reply arrived.
    #[error("request timed out")]
    Timeout,

    /// The auth/handshake sequence was rejected by the server.
    #[error("authentication failed ({kind}): {message}")]
    AuthFailed { kind: ErrorKind, message: String },

    /// Transport-level I/O failure (connect, read, or write).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A command was sent that the current connection mode does not allow
    /// (e.g. a data command on a subscriber connection).
    #[error("command {0} is not valid in the current connection state")]
    InvalidStateForCommand(&'static str),
}

impl Error {
    /// Connection-scoped errors trigger the drain/replay path (§4.5) and are
    /// published to the connection-health observer (§7). Request-scoped
    /// errors complete only the request that produced them.
    pub fn is_connection_scoped(&self) -> bool {
        matches!(
            self,
            Error::ProtocolError(_)
                | Error::ConnectionClosed
                | Error::AuthFailed { .. }
                | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
