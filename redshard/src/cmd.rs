//! Thin command constructors.
//!
//! Each helper packages arguments into a ready-to-dispatch [`Cmd`], routed
//! by the command's own key. To co-locate related keys, or to send a
//! command these helpers don't cover, use [`Cmd::build`] with an explicit
//! routing key and a [`Request`](protocol_resp::Request).

use std::collections::HashMap;

use protocol_resp::Request;

use crate::command::Cmd;

/// GET key
pub fn get(key: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::get(key))
}

/// SET key value
pub fn set(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::with_payload(key, Request::set(key, value.as_ref()).encode())
}

/// SET key value EX seconds
pub fn set_ex(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>, seconds: u64) -> Cmd {
    let key = key.as_ref();
    Cmd::with_payload(key, Request::set(key, value.as_ref()).ex(seconds).encode())
}

/// SETNX key value
pub fn set_nx(key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::set_nx(key, value.as_ref()))
}

/// DEL key
pub fn del(key: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::del(key))
}

/// EXPIRE key seconds
pub fn expire(key: impl AsRef<[u8]>, seconds: u64) -> Cmd {
    let key = key.as_ref();
    let mut secs = itoa::Buffer::new();
    Cmd::build(
        key,
        &Request::cmd(b"EXPIRE").arg(key).arg(secs.format(seconds).as_bytes()),
    )
}

/// INCR key
pub fn incr(key: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::cmd(b"INCR").arg(key))
}

/// INCRBY key delta
pub fn incr_by(key: impl AsRef<[u8]>, delta: i64) -> Cmd {
    let key = key.as_ref();
    let mut buf = itoa::Buffer::new();
    Cmd::build(
        key,
        &Request::cmd(b"INCRBY").arg(key).arg(buf.format(delta).as_bytes()),
    )
}

/// DECR key
pub fn decr(key: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::cmd(b"DECR").arg(key))
}

/// HGET key field
pub fn hget(key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::cmd(b"HGET").arg(key).arg(field.as_ref()))
}

/// HSET key field value
pub fn hset(
    key: impl AsRef<[u8]>,
    field: impl AsRef<[u8]>,
    value: impl AsRef<[u8]>,
) -> Cmd {
    let key = key.as_ref();
    Cmd::build(
        key,
        &Request::cmd(b"HSET")
            .arg(key)
            .arg(field.as_ref())
            .arg(value.as_ref()),
    )
}

/// HDEL key field
pub fn hdel(key: impl AsRef<[u8]>, field: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::cmd(b"HDEL").arg(key).arg(field.as_ref()))
}

/// HGETALL key
pub fn hgetall(key: impl AsRef<[u8]>) -> Cmd {
    let key = key.as_ref();
    Cmd::build(key, &Request::cmd(b"HGETALL").arg(key))
}

/// Parse the text of an `INFO` reply into its `key:value` lines.
///
/// Section headers (`# Server`) and blank lines are skipped. Typically
/// combined with a broadcast:
///
/// ```no_run
/// # use redshard::{parse_info, ShardedClient, ShardedConfig};
/// # let client = ShardedClient::new(vec![("s0", "127.0.0.1:6379")], ShardedConfig::default());
/// for (label, mut cmd) in client.map_exec(&["INFO"]) {
///     if let Ok(Some(text)) = cmd.take_string() {
///         let info = parse_info(&text);
///         println!("{label}: {:?}", info.get("redis_version"));
///     }
/// }
/// ```
pub fn parse_info(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_route_by_their_key() {
        let a = get("mykey");
        let b = set("mykey", "value");
        let c = set_ex("mykey", "value", 60);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(b.hash(), c.hash());
        assert_eq!(a.hash(), ketama::hash_key(b"mykey"));
    }

    #[test]
    fn set_ex_goes_out_as_decimal_seconds() {
        let cmd = set_ex("k", "v", 60);
        assert_eq!(
            cmd.payload(),
            b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n60\r\n"
        );
    }

    #[test]
    fn set_nx_and_expire_payloads() {
        assert_eq!(
            set_nx("k", "v").payload(),
            b"*3\r\n$5\r\nSETNX\r\n$1\r\nk\r\n$1\r\nv\r\n"
        );
        assert_eq!(
            expire("k", 60).payload(),
            b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$2\r\n60\r\n"
        );
    }

    #[test]
    fn hash_helpers_route_by_hash_key() {
        assert_eq!(hget("h", "f").hash(), hset("h", "f", "v").hash());
        assert_eq!(hget("h", "f").hash(), ketama::hash_key(b"h"));
    }

    #[test]
    fn info_text_parses_into_pairs() {
        let text = "# Server\r\nredis_version:7.2.4\r\nuptime_in_seconds:123\r\n\r\n# Clients\r\nconnected_clients:1\r\n";
        let info = parse_info(text);
        assert_eq!(info.get("redis_version").map(String::as_str), Some("7.2.4"));
        assert_eq!(info.get("connected_clients").map(String::as_str), Some("1"));
        assert!(!info.contains_key("# Server"));
    }
}
