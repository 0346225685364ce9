//! Command frames and typed result accessors.

use std::collections::HashMap;
use std::mem;

use bytes::Bytes;
use protocol_resp::{Request, Value};

use crate::error::Error;

/// One command and, after dispatch, its result.
///
/// A frame is built once from a routing key and a request, executed by at
/// most one connection per dispatch, and read once by the caller. The
/// result slot is a three-state latch: unexecuted frames report
/// [`Error::NotExecuted`], a second read reports [`Error::AlreadyConsumed`].
/// Re-dispatching a frame overwrites whatever result it held.
///
/// The routing key only selects a shard; it does not have to equal the key
/// inside the command. Hashing two commands with the same routing key
/// forces them onto the same shard:
///
/// ```
/// use redshard::{Cmd, Request};
///
/// let user = Cmd::build(b"user:17", &Request::get(b"user:17:name"));
/// let session = Cmd::build(b"user:17", &Request::get(b"user:17:session"));
/// ```
#[derive(Debug)]
pub struct Cmd {
    hash: u32,
    payload: Vec<u8>,
    outcome: Outcome,
}

#[derive(Debug)]
enum Outcome {
    Unexecuted,
    Executed(Result<Value, Error>),
    Consumed,
}

impl Cmd {
    /// Build a frame routed by `key`. The request is serialized once, here.
    pub fn build(key: impl AsRef<[u8]>, request: &Request<'_>) -> Cmd {
        Cmd {
            hash: ketama::hash_key(key.as_ref()),
            payload: request.encode(),
            outcome: Outcome::Unexecuted,
        }
    }

    /// Build a frame from an already-encoded payload, routed by `key`.
    pub(crate) fn with_payload(key: &[u8], payload: Vec<u8>) -> Cmd {
        Cmd {
            hash: ketama::hash_key(key),
            payload,
            outcome: Outcome::Unexecuted,
        }
    }

    /// Build a frame with no routing key, for entry points that pick the
    /// shard themselves (`map_exec`, `rand_exec`, `shard_exec`).
    pub(crate) fn unrouted(payload: Vec<u8>) -> Cmd {
        Cmd {
            hash: 0,
            payload,
            outcome: Outcome::Unexecuted,
        }
    }

    /// Routing-key hash, computed at build time.
    pub(crate) fn hash(&self) -> u32 {
        self.hash
    }

    /// Serialized request bytes.
    pub(crate) fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Store the command's outcome. Called exactly once per dispatch by the
    /// executing connection (or by the shard when no connection was
    /// available).
    pub(crate) fn finish(&mut self, result: Result<Value, Error>) {
        self.outcome = Outcome::Executed(result);
    }

    pub(crate) fn fail(&mut self, err: Error) {
        self.finish(Err(err));
    }

    /// Retrieve the result, consuming it.
    ///
    /// A server `-ERR` reply surfaces here as [`Error::Server`]; transport
    /// failures as [`Error::Dial`]/[`Error::Io`]/[`Error::Protocol`].
    pub fn take(&mut self) -> Result<Value, Error> {
        match mem::replace(&mut self.outcome, Outcome::Consumed) {
            Outcome::Unexecuted => Err(Error::NotExecuted),
            Outcome::Executed(result) => result,
            Outcome::Consumed => Err(Error::AlreadyConsumed),
        }
    }

    /// Result as bytes. A null reply yields `None`.
    pub fn take_bytes(&mut self) -> Result<Option<Bytes>, Error> {
        match self.take()? {
            Value::BulkString(b) | Value::SimpleString(b) => Ok(Some(b)),
            Value::Null => Ok(None),
            other => Err(mismatch(&other, "bulk string")),
        }
    }

    /// Result as a UTF-8 string (lossy). A null reply yields `None`.
    pub fn take_string(&mut self) -> Result<Option<String>, Error> {
        Ok(self
            .take_bytes()?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    /// Result as an integer. Accepts integer replies and bulk strings
    /// holding decimal digits; a null reply yields 0.
    pub fn take_int(&mut self) -> Result<i64, Error> {
        match self.take()? {
            Value::Integer(n) => Ok(n),
            Value::BulkString(b) => std::str::from_utf8(&b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::TypeMismatch {
                    have: "bulk string",
                    want: "integer",
                }),
            Value::Null => Ok(0),
            other => Err(mismatch(&other, "integer")),
        }
    }

    /// Result as a list of strings. A null reply yields an empty list.
    pub fn take_strings(&mut self) -> Result<Vec<String>, Error> {
        match self.take()? {
            Value::Array(items) => items.into_iter().map(string_item).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(mismatch(&other, "array")),
        }
    }

    /// Result as a field/value map, the shape HGETALL and CONFIG GET
    /// return. A null reply yields an empty map.
    pub fn take_string_map(&mut self) -> Result<HashMap<String, String>, Error> {
        let items = self.take_array_items()?;
        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let Some(field) = iter.next() {
            let Some(value) = iter.next() else { break };
            map.insert(string_item(field)?, string_item(value)?);
        }
        Ok(map)
    }

    /// Result as a field/integer map. A null reply yields an empty map.
    pub fn take_int_map(&mut self) -> Result<HashMap<String, i64>, Error> {
        let items = self.take_array_items()?;
        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let Some(field) = iter.next() {
            let Some(value) = iter.next() else { break };
            map.insert(string_item(field)?, int_item(value)?);
        }
        Ok(map)
    }

    fn take_array_items(&mut self) -> Result<Vec<Value>, Error> {
        match self.take()? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(mismatch(&other, "array")),
        }
    }
}

fn mismatch(value: &Value, want: &'static str) -> Error {
    Error::TypeMismatch {
        have: value.kind(),
        want,
    }
}

fn string_item(value: Value) -> Result<String, Error> {
    match value.as_bytes() {
        Some(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        None => Err(mismatch(&value, "bulk string")),
    }
}

fn int_item(value: Value) -> Result<i64, Error> {
    match value {
        Value::Integer(n) => Ok(n),
        Value::BulkString(b) => std::str::from_utf8(&b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(Error::TypeMismatch {
                have: "bulk string",
                want: "integer",
            }),
        other => Err(mismatch(&other, "integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executed(value: Value) -> Cmd {
        let mut cmd = Cmd::build("k", &Request::get(b"k"));
        cmd.finish(Ok(value));
        cmd
    }

    #[test]
    fn result_latch_walks_its_three_states() {
        let mut cmd = Cmd::build("k", &Request::get(b"k"));
        assert_eq!(cmd.take().unwrap_err(), Error::NotExecuted);
        assert_eq!(cmd.take().unwrap_err(), Error::AlreadyConsumed);

        let mut cmd = executed(Value::simple_string(b"OK"));
        assert_eq!(cmd.take().unwrap(), Value::simple_string(b"OK"));
        assert_eq!(cmd.take().unwrap_err(), Error::AlreadyConsumed);
        assert_eq!(cmd.take().unwrap_err(), Error::AlreadyConsumed);
    }

    #[test]
    fn redispatch_overwrites_previous_result() {
        let mut cmd = executed(Value::Integer(1));
        cmd.finish(Ok(Value::Integer(2)));
        assert_eq!(cmd.take().unwrap(), Value::Integer(2));
    }

    #[test]
    fn same_routing_key_same_hash() {
        let a = Cmd::build("user:17", &Request::get(b"user:17:name"));
        let b = Cmd::build("user:17", &Request::get(b"user:17:session"));
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash(), ketama::hash_key(b"user:17"));
    }

    #[test]
    fn payload_is_wire_format() {
        let cmd = Cmd::build("k", &Request::get(b"k"));
        assert_eq!(cmd.payload(), b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
    }

    #[test]
    fn take_bytes_and_string() {
        assert_eq!(
            executed(Value::bulk_string(b"bar")).take_bytes().unwrap(),
            Some(Bytes::from_static(b"bar"))
        );
        assert_eq!(executed(Value::Null).take_bytes().unwrap(), None);
        assert_eq!(
            executed(Value::simple_string(b"OK")).take_string().unwrap(),
            Some("OK".to_string())
        );
        assert_eq!(
            executed(Value::Integer(3)).take_bytes().unwrap_err(),
            Error::TypeMismatch {
                have: "integer",
                want: "bulk string"
            }
        );
    }

    #[test]
    fn take_int_accepts_integers_and_digit_strings() {
        assert_eq!(executed(Value::Integer(-42)).take_int().unwrap(), -42);
        assert_eq!(executed(Value::bulk_string(b"17")).take_int().unwrap(), 17);
        assert_eq!(executed(Value::Null).take_int().unwrap(), 0);
        assert!(executed(Value::bulk_string(b"seventeen"))
            .take_int()
            .is_err());
    }

    #[test]
    fn take_strings_and_maps() {
        let mut cmd = executed(Value::Array(vec![
            Value::bulk_string(b"a"),
            Value::bulk_string(b"b"),
        ]));
        assert_eq!(cmd.take_strings().unwrap(), vec!["a", "b"]);

        let mut cmd = executed(Value::Array(vec![
            Value::bulk_string(b"name"),
            Value::bulk_string(b"ziggy"),
            Value::bulk_string(b"color"),
            Value::bulk_string(b"red"),
        ]));
        let map = cmd.take_string_map().unwrap();
        assert_eq!(map.get("name").map(String::as_str), Some("ziggy"));
        assert_eq!(map.get("color").map(String::as_str), Some("red"));

        let mut cmd = executed(Value::Array(vec![
            Value::bulk_string(b"hits"),
            Value::Integer(3),
            Value::bulk_string(b"misses"),
            Value::bulk_string(b"9"),
        ]));
        let map = cmd.take_int_map().unwrap();
        assert_eq!(map.get("hits"), Some(&3));
        assert_eq!(map.get("misses"), Some(&9));

        assert_eq!(executed(Value::Null).take_strings().unwrap(), Vec::<String>::new());
        assert!(executed(Value::Integer(1)).take_strings().is_err());
    }

    #[test]
    fn server_error_surfaces_on_take() {
        let mut cmd = Cmd::build("k", &Request::get(b"k"));
        cmd.fail(Error::Server("ERR boom".into()));
        assert_eq!(cmd.take().unwrap_err(), Error::Server("ERR boom".into()));
        assert_eq!(cmd.take().unwrap_err(), Error::AlreadyConsumed);
    }
}
