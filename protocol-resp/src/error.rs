//! Error types for RESP reply decoding.

/// A malformed reply stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Unknown reply type tag.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Non-digit byte inside an integer body.
    #[error("invalid integer byte: {0:#04x}")]
    InvalidInteger(u8),

    /// Framing violation (missing CRLF and friends).
    #[error("protocol error: {0}")]
    Protocol(&'static str),
}

/// Error from [`ReplyReader::next`](crate::ReplyReader::next).
///
/// I/O errors from the underlying stream propagate unchanged; parse errors
/// mean the stream is desynchronized and the connection should be dropped.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(
            ParseError::InvalidPrefix(0x41).to_string(),
            "invalid type prefix: 0x41"
        );
        assert_eq!(
            ParseError::InvalidInteger(b'x').to_string(),
            "invalid integer byte: 0x78"
        );
        assert_eq!(
            ParseError::Protocol("missing CRLF").to_string(),
            "protocol error: missing CRLF"
        );
    }

    #[test]
    fn read_error_wraps_io() {
        let err: ReadError = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(err, ReadError::Io(_)));
    }
}
