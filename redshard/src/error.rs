//! Client error taxonomy.

use std::io;

use protocol_resp::ReadError;

/// Errors reported on individual commands or returned by dispatch entry
/// points.
///
/// The variants are `Clone` because shard-wide failures (dial, I/O,
/// protocol) are replicated onto every frame of the affected pipeline, and
/// the last dial error is cached to fail fast while a server is down. I/O
/// causes are therefore captured as text instead of holding the live
/// [`std::io::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The command never reached a connection.
    #[error("command not executed")]
    NotExecuted,

    /// The command's result was already retrieved once.
    #[error("result already retrieved")]
    AlreadyConsumed,

    /// The TCP connect (or the on-connect handshake) failed.
    #[error("dial {addr}: {msg}")]
    Dial { addr: String, msg: String },

    /// A read, write, or flush failed mid-pipeline.
    #[error("io error: {0}")]
    Io(String),

    /// The reply stream was malformed; the connection is dropped.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error reply. The connection stays
    /// healthy; only this command is affected.
    #[error("server error: {0}")]
    Server(String),

    /// `shard_exec` was given a label that is not configured.
    #[error("unknown shard: {0}")]
    UnknownShard(String),

    /// A typed accessor was used on a reply of a different shape.
    #[error("unexpected reply: have {have}, want {want}")]
    TypeMismatch {
        have: &'static str,
        want: &'static str,
    },

    /// The client was closed.
    #[error("client closed")]
    Closed,
}

impl Error {
    pub(crate) fn io(err: &io::Error) -> Self {
        match err.kind() {
            // SO_RCVTIMEO/SO_SNDTIMEO expiry surfaces as either kind
            // depending on the platform.
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                Error::Io("pipeline deadline exceeded".into())
            }
            _ => Error::Io(err.to_string()),
        }
    }

    pub(crate) fn dial(addr: &str, err: &io::Error) -> Self {
        Error::Dial {
            addr: addr.to_string(),
            msg: err.to_string(),
        }
    }
}

impl From<ReadError> for Error {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(e) => Error::io(&e),
            ReadError::Parse(e) => Error::Protocol(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_collapse_to_deadline_message() {
        let err = Error::io(&io::Error::from(io::ErrorKind::WouldBlock));
        assert_eq!(err, Error::Io("pipeline deadline exceeded".into()));
        let err = Error::io(&io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(err, Error::Io("pipeline deadline exceeded".into()));
    }

    #[test]
    fn parse_errors_become_protocol_errors() {
        let parse = protocol_resp::ParseError::InvalidPrefix(b'?');
        let err: Error = ReadError::from(parse).into();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn display_carries_context() {
        let err = Error::Dial {
            addr: "127.0.0.1:6379".into(),
            msg: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "dial 127.0.0.1:6379: connection refused");

        let err = Error::TypeMismatch {
            have: "integer",
            want: "bulk string",
        };
        assert_eq!(
            err.to_string(),
            "unexpected reply: have integer, want bulk string"
        );
    }
}
