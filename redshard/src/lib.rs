//! Embedded sharded client for Redis-style servers.
//!
//! `redshard` replaces a TCP-level sharding proxy (twemproxy-style) by
//! moving consistent-hash routing, connection pooling, and pipelining into
//! the calling process. Commands are sharded by a caller-supplied routing
//! key and sent to a single server each; you hand a batch to
//! [`ShardedClient::exec`] and, after it returns, check every command
//! individually for its value or error.
//!
//! Commands are sent in as few packets as possible: concurrently
//! submitted batches that land on the same shard are pipelined over the
//! same small set of connections.
//!
//! # Example
//!
//! ```no_run
//! use redshard::{cmd, ShardedClient, ShardedConfig};
//!
//! let client = ShardedClient::new(
//!     vec![
//!         ("shard0", "10.0.0.1:6379"),
//!         ("shard1", "10.0.0.2:6379"),
//!     ],
//!     ShardedConfig::default(),
//! );
//!
//! let mut set = cmd::set("greeting", "hello");
//! let mut get = cmd::get("greeting");
//! client.exec(std::slice::from_mut(&mut set));
//! client.exec(std::slice::from_mut(&mut get));
//!
//! assert_eq!(get.take_string().unwrap().as_deref(), Some("hello"));
//! client.close();
//! ```
//!
//! Commands that mutate connection state (`SELECT`), span multiple shards
//! (`MGET`, `RENAME` across keys), or break the one-request-one-reply shape
//! (`SUBSCRIBE`, `WATCH`) are outside the routing model: every connection
//! in a shard's pool must stay interchangeable.

mod client;
mod command;
mod conn;
mod error;
mod pool;
mod shard;

pub mod cmd;

pub use client::{LogFn, ShardedClient, ShardedConfig};
pub use cmd::parse_info;
pub use command::Cmd;
pub use error::Error;

// Re-exported for building custom commands and inspecting raw replies.
pub use protocol_resp::{Request, SetRequest, Value};
