//! Streaming RESP reply decoder.
//!
//! [`ReplyReader`] sits on a buffered byte stream and decodes one reply per
//! [`next`](ReplyReader::next) call. It owns two reusable scratch buffers: a
//! line buffer for headers and a payload buffer grown on demand for bulk
//! strings. Bulk payloads are copied out as fresh [`Bytes`] so decoded
//! values outlive the scratch space.

use std::io::{self, BufRead};

use bytes::Bytes;

use crate::error::{ParseError, ReadError};
use crate::value::Value;

pub struct ReplyReader<R> {
    inner: R,
    line: Vec<u8>,
    scratch: Vec<u8>,
}

impl<R: BufRead> ReplyReader<R> {
    pub fn new(inner: R) -> Self {
        ReplyReader {
            inner,
            line: Vec::with_capacity(64),
            scratch: Vec::new(),
        }
    }

    /// Decode the next reply from the stream.
    ///
    /// Repeated calls yield successive replies. I/O errors propagate
    /// unchanged; a parse error means the stream position is lost and the
    /// reader must not be reused.
    pub fn next(&mut self) -> Result<Value, ReadError> {
        let mut tag = [0u8; 1];
        self.inner.read_exact(&mut tag)?;

        match tag[0] {
            b'+' => {
                self.read_line()?;
                Ok(Value::SimpleString(Bytes::copy_from_slice(&self.line)))
            }
            b'-' => {
                self.read_line()?;
                Ok(Value::Error(Bytes::copy_from_slice(&self.line)))
            }
            b':' => Ok(Value::Integer(self.read_int()?)),
            b'$' => self.read_bulk(),
            b'*' => self.read_array(),
            other => Err(ParseError::InvalidPrefix(other).into()),
        }
    }

    /// Read one CRLF-terminated line into `self.line`, CRLF stripped.
    fn read_line(&mut self) -> Result<(), ReadError> {
        self.line.clear();
        self.inner.read_until(b'\n', &mut self.line)?;
        if self.line.last() != Some(&b'\n') {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        if self.line.len() < 2 || self.line[self.line.len() - 2] != b'\r' {
            return Err(ParseError::Protocol("reply line not CRLF terminated").into());
        }
        self.line.truncate(self.line.len() - 2);
        Ok(())
    }

    /// Read a decimal integer body: an optional leading `-`, then digits.
    fn read_int(&mut self) -> Result<i64, ReadError> {
        self.read_line()?;

        let (negate, digits) = match self.line.split_first() {
            Some((&b'-', rest)) => (true, rest),
            _ => (false, &self.line[..]),
        };

        let mut n: i64 = 0;
        for &b in digits {
            if !b.is_ascii_digit() {
                return Err(ParseError::InvalidInteger(b).into());
            }
            n = n * 10 + i64::from(b - b'0');
        }
        Ok(if negate { -n } else { n })
    }

    /// `$<len>\r\n<payload>\r\n`; a negative length is a null bulk with no
    /// payload.
    fn read_bulk(&mut self) -> Result<Value, ReadError> {
        let len = self.read_int()?;
        if len < 0 {
            return Ok(Value::Null);
        }

        let len = len as usize;
        if self.scratch.len() < len + 2 {
            self.scratch.resize(len + 2, 0);
        }
        self.inner.read_exact(&mut self.scratch[..len + 2])?;
        if self.scratch[len] != b'\r' || self.scratch[len + 1] != b'\n' {
            return Err(ParseError::Protocol("bulk payload not CRLF terminated").into());
        }
        Ok(Value::BulkString(Bytes::copy_from_slice(&self.scratch[..len])))
    }

    /// `*<n>\r\n` followed by n replies, read recursively; a negative count
    /// is a null array.
    fn read_array(&mut self) -> Result<Value, ReadError> {
        let len = self.read_int()?;
        if len < 0 {
            return Ok(Value::Null);
        }

        let len = len as usize;
        let mut items = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            items.push(self.next()?);
        }
        Ok(Value::Array(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn reader(payload: &[u8]) -> ReplyReader<BufReader<&[u8]>> {
        ReplyReader::new(BufReader::new(payload))
    }

    #[test]
    fn decodes_every_reply_shape() {
        let cases: &[(&[u8], Value)] = &[
            (b"+OK\r\n", Value::simple_string(b"OK")),
            (b"+PONG\r\n", Value::simple_string(b"PONG")),
            (b"-Error message\r\n", Value::error(b"Error message")),
            (b":1000\r\n", Value::Integer(1000)),
            (b":-123\r\n", Value::Integer(-123)),
            (b":0\r\n", Value::Integer(0)),
            (b"$6\r\nfoobar\r\n", Value::bulk_string(b"foobar")),
            (b"$0\r\n\r\n", Value::bulk_string(b"")),
            (b"$-1\r\n", Value::Null),
            (b"*0\r\n", Value::Array(vec![])),
            (
                b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
                Value::Array(vec![Value::bulk_string(b"foo"), Value::bulk_string(b"bar")]),
            ),
            (
                b"*3\r\n:1\r\n:2\r\n:3\r\n",
                Value::Array(vec![
                    Value::Integer(1),
                    Value::Integer(2),
                    Value::Integer(3),
                ]),
            ),
            (
                b"*5\r\n:1\r\n:2\r\n:3\r\n:4\r\n$6\r\nfoobar\r\n",
                Value::Array(vec![
                    Value::Integer(1),
                    Value::Integer(2),
                    Value::Integer(3),
                    Value::Integer(4),
                    Value::bulk_string(b"foobar"),
                ]),
            ),
            (b"*-1\r\n", Value::Null),
        ];

        for (payload, want) in cases {
            let mut r = reader(payload);
            let have = r.next().unwrap();
            assert_eq!(&have, want, "payload {:?}", payload);
        }
    }

    #[test]
    fn successive_replies_from_one_stream() {
        let mut r = reader(b":1000\r\n:4321\r\n+OK\r\n");
        assert_eq!(r.next().unwrap(), Value::Integer(1000));
        assert_eq!(r.next().unwrap(), Value::Integer(4321));
        assert_eq!(r.next().unwrap(), Value::simple_string(b"OK"));
    }

    #[test]
    fn nested_arrays() {
        let mut r = reader(b"*2\r\n*2\r\n:1\r\n:2\r\n$1\r\nx\r\n");
        assert_eq!(
            r.next().unwrap(),
            Value::Array(vec![
                Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
                Value::bulk_string(b"x"),
            ])
        );
    }

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        let mut r = reader(b"!oops\r\n");
        match r.next() {
            Err(ReadError::Parse(ParseError::InvalidPrefix(b'!'))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn minus_sign_only_allowed_first() {
        let mut r = reader(b":12-3\r\n");
        match r.next() {
            Err(ReadError::Parse(ParseError::InvalidInteger(b'-'))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn junk_in_integer_body() {
        let mut r = reader(b":12a\r\n");
        assert!(matches!(
            r.next(),
            Err(ReadError::Parse(ParseError::InvalidInteger(b'a')))
        ));
    }

    #[test]
    fn bare_lf_line_is_rejected() {
        let mut r = reader(b"+OK\n");
        assert!(matches!(r.next(), Err(ReadError::Parse(_))));
    }

    #[test]
    fn bulk_missing_trailing_crlf() {
        let mut r = reader(b"$3\r\nfooXY");
        assert!(matches!(r.next(), Err(ReadError::Parse(_))));
    }

    #[test]
    fn eof_surfaces_as_io_error() {
        let mut r = reader(b"");
        assert!(matches!(r.next(), Err(ReadError::Io(_))));

        let mut r = reader(b"$6\r\nfoo");
        assert!(matches!(r.next(), Err(ReadError::Io(_))));
    }

    #[test]
    fn binary_safe_bulk_payload() {
        let mut r = reader(b"$5\r\na\x00b\r \r\n");
        // payload may contain CR and NUL bytes
        assert_eq!(r.next().unwrap(), Value::bulk_string(b"a\x00b\r "));
    }
}
