//! Client-side RESP2 protocol implementation.
//!
//! This crate provides the pieces a blocking RESP client needs:
//!
//! - **Values**: the five RESP2 reply shapes ([`Value`])
//! - **Reading**: a streaming decoder over any buffered byte stream
//!   ([`ReplyReader`])
//! - **Requests**: command encoding as arrays of bulk strings ([`Request`])
//!
//! # Example
//!
//! ```
//! use std::io::BufReader;
//! use protocol_resp::{ReplyReader, Request, Value};
//!
//! // Encode a GET command for the wire.
//! let payload = Request::get(b"mykey").encode();
//! assert_eq!(payload, b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
//!
//! // Decode the server's reply stream.
//! let stream: &[u8] = b"$5\r\nhello\r\n";
//! let mut reader = ReplyReader::new(BufReader::new(stream));
//! assert_eq!(reader.next().unwrap(), Value::bulk_string(b"hello"));
//! ```

mod error;
mod reader;
mod request;
mod value;

pub use error::{ParseError, ReadError};
pub use reader::ReplyReader;
pub use request::{encode_command, Request, SetRequest};
pub use value::Value;
