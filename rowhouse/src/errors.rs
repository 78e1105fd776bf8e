use thiserror::Error;

use crate::protocol::ServerException;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Truncated or structurally invalid wire bytes.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// The server sent a packet tag outside the expected set for the current
    /// state.
    #[error("unknown packet id from server: {0}")]
    UnknownPacket(u64),
    /// A type descriptor string could not be parsed.
    #[error("unknown type: '{0}'")]
    UnknownType(String),
    /// A value's shape does not fit the column type it was offered to.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Numeric or enum value outside the range of the target type.
    #[error("domain error: {0}")]
    DomainError(String),
    /// A compressed frame failed CityHash128 verification.
    #[error("compressed frame checksum mismatch")]
    ChecksumMismatch,
    /// An exception raised inside the server. Does not close the connection.
    #[error("server exception: {0}")]
    ServerException(Box<ServerException>),
    /// A blocking socket operation exceeded the configured timeout.
    #[error("operation timed out")]
    Timeout,
    /// The socket was closed, or the connection was already marked closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    /// A state machine invariant was breached.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Error::Timeout,
            ErrorKind::UnexpectedEof => {
                Error::MalformedFrame("unexpected end of stream".to_string())
            }
            _ => Error::ConnectionClosed(e.to_string()),
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::MalformedFrame(format!("invalid utf-8 in string: {e}"))
    }
}
