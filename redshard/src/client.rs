//! The sharded client: batch partitioning, fan-out, and join.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ketama::{Bucket, Continuum};
use protocol_resp::Request;
use rand::Rng;

use crate::command::Cmd;
use crate::error::Error;
use crate::shard::Shard;

/// Per-batch performance callback: `(shard label, batch size, duration,
/// error)`. The duration is wall time of the pipeline and is zero whenever
/// an error occurred. May be invoked concurrently from multiple shard
/// tasks.
pub type LogFn = dyn Fn(&str, usize, Duration, Option<&Error>) + Send + Sync;

/// Configuration for a [`ShardedClient`].
pub struct ShardedConfig {
    /// Password for an `AUTH` sent on every fresh connection before any
    /// user command. `None` skips authentication.
    pub password: Option<String>,
    /// Connections per shard. Values below 1 are clamped to 1.
    pub pool_size: usize,
    /// Deadline for dialing and for each pipeline (write through last
    /// read).
    pub connect_timeout: Duration,
    /// Per-batch performance callback.
    pub log: Option<Arc<LogFn>>,
}

impl Default for ShardedConfig {
    fn default() -> Self {
        ShardedConfig {
            password: None,
            pool_size: 3,
            connect_timeout: Duration::from_secs(1),
            log: None,
        }
    }
}

/// A sharded RESP client.
///
/// Routes each command to one of a fixed set of servers by consistent
/// hashing on the command's routing key, pipelines per-shard sub-batches
/// over pooled connections, and reports every outcome on the command frame
/// itself; [`exec`](ShardedClient::exec) never fails as a whole.
///
/// The client is `Sync`; batches from many threads interleave freely and
/// are coalesced per shard by the connection pools.
pub struct ShardedClient {
    continuum: Continuum,
    shards: Vec<Shard>,
    log: Option<Arc<LogFn>>,
}

impl ShardedClient {
    /// Create a client for a set of `(label, host:port)` shards.
    ///
    /// Labels are the stable identity of a shard: the continuum is built
    /// from labels only, so an address can be swapped by constructing a new
    /// client without remapping any keys. Connections are dialed lazily on
    /// first use.
    ///
    /// # Panics
    ///
    /// Panics if `shards` is empty.
    pub fn new<L, A>(shards: impl IntoIterator<Item = (L, A)>, config: ShardedConfig) -> Self
    where
        L: Into<String>,
        A: Into<String>,
    {
        let hosts: BTreeMap<String, String> = shards
            .into_iter()
            .map(|(label, addr)| (label.into(), addr.into()))
            .collect();
        assert!(!hosts.is_empty(), "sharded client needs at least one shard");

        let mut on_connect = Vec::new();
        if let Some(password) = &config.password {
            on_connect.push(Request::auth(password.as_bytes()).encode());
        }
        let on_connect = Arc::new(on_connect);

        let buckets: Vec<Bucket> = hosts
            .keys()
            .enumerate()
            .map(|(id, label)| Bucket::new(label.clone(), id as u16, 1))
            .collect();
        let continuum = Continuum::build(&buckets);

        let pool_size = config.pool_size.max(1);
        let shards = hosts
            .into_iter()
            .map(|(label, addr)| {
                Shard::new(
                    label,
                    addr,
                    pool_size,
                    config.connect_timeout,
                    Arc::clone(&on_connect),
                )
            })
            .collect();

        ShardedClient {
            continuum,
            shards,
            log: config.log,
        }
    }

    /// Execute a batch of commands, blocking until every frame has an
    /// outcome.
    ///
    /// The batch is partitioned by routing key into per-shard sub-batches
    /// which run in parallel, one pipeline each. Within a sub-batch replies
    /// land on frames in submission order; across shards there is no
    /// ordering. Errors are never raised here; inspect each frame.
    pub fn exec(&self, cmds: &mut [Cmd]) {
        if cmds.is_empty() {
            return;
        }

        let mut buckets: Vec<Vec<&mut Cmd>> =
            (0..self.shards.len()).map(|_| Vec::new()).collect();
        for cmd in cmds.iter_mut() {
            let slot = self.continuum.lookup(cmd.hash()) as usize;
            buckets[slot].push(cmd);
        }

        let log = self.log.as_deref();
        thread::scope(|scope| {
            for (slot, bucket) in buckets.into_iter().enumerate() {
                if bucket.is_empty() {
                    continue;
                }
                let shard = &self.shards[slot];
                scope.spawn(move || shard.exec(bucket, log));
            }
        });
    }

    /// Broadcast one command to every shard in parallel. Returns a
    /// label-to-frame map for per-shard inspection.
    pub fn map_exec(&self, args: &[&str]) -> HashMap<String, Cmd> {
        let arg_bytes: Vec<&[u8]> = args.iter().map(|a| a.as_bytes()).collect();
        let payload = Request::new(arg_bytes).encode();

        let mut entries: Vec<(String, Cmd)> = self
            .shards
            .iter()
            .map(|shard| (shard.label().to_string(), Cmd::unrouted(payload.clone())))
            .collect();

        let log = self.log.as_deref();
        thread::scope(|scope| {
            for ((_, cmd), shard) in entries.iter_mut().zip(&self.shards) {
                scope.spawn(move || shard.exec(vec![cmd], log));
            }
        });

        entries.into_iter().collect()
    }

    /// Execute one command on the named shard, ignoring its routing key.
    pub fn shard_exec(&self, label: &str, cmd: &mut Cmd) -> Result<(), Error> {
        let idx = self
            .shards
            .binary_search_by(|shard| shard.label().cmp(label))
            .map_err(|_| Error::UnknownShard(label.to_string()))?;
        self.shards[idx].exec(vec![cmd], self.log.as_deref());
        Ok(())
    }

    /// Execute one command on a uniformly random shard. Returns the chosen
    /// shard's label and address.
    pub fn rand_exec(&self, cmd: &mut Cmd) -> (&str, &str) {
        let idx = rand::thread_rng().gen_range(0..self.shards.len());
        let shard = &self.shards[idx];
        shard.exec(vec![cmd], self.log.as_deref());
        (shard.label(), shard.addr())
    }

    /// The shard label a routing key maps to. For debugging and tests.
    pub fn addr(&self, key: impl AsRef<[u8]>) -> &str {
        let slot = self.continuum.locate(key.as_ref()) as usize;
        self.shards[slot].label()
    }

    /// Close every pool. Pending acquires fail with [`Error::Closed`];
    /// the call blocks until all in-flight pipelines have finished.
    pub fn close(&self) {
        for shard in &self.shards {
            shard.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_shards() -> ShardedClient {
        ShardedClient::new(
            vec![("shard0", "127.0.0.1:16379"), ("shard1", "127.0.0.1:16380")],
            ShardedConfig::default(),
        )
    }

    #[test]
    fn addr_matches_proxy_reference_mapping() {
        let client = two_shards();
        assert_eq!(client.addr("noooot"), "shard0");
        assert_eq!(client.addr("aap"), "shard1");
    }

    #[test]
    fn addr_is_stable_across_instances() {
        let a = two_shards();
        let b = two_shards();
        for i in 0..200 {
            let key = format!("stability-{i}");
            assert_eq!(a.addr(&key), b.addr(&key));
        }
    }

    #[test]
    fn label_order_does_not_depend_on_insertion_order() {
        let a = ShardedClient::new(
            vec![("s1", "h1:1"), ("s0", "h0:0")],
            ShardedConfig::default(),
        );
        let b = ShardedClient::new(
            vec![("s0", "h0:0"), ("s1", "h1:1")],
            ShardedConfig::default(),
        );
        for i in 0..200 {
            let key = format!("order-{i}");
            assert_eq!(a.addr(&key), b.addr(&key));
        }
    }

    #[test]
    fn unknown_shard_is_reported() {
        let client = two_shards();
        let mut cmd = crate::cmd::get("x");
        assert_eq!(
            client.shard_exec("nope", &mut cmd).unwrap_err(),
            Error::UnknownShard("nope".into())
        );
    }

    #[test]
    #[should_panic(expected = "at least one shard")]
    fn empty_shard_map_rejected() {
        ShardedClient::new(Vec::<(String, String)>::new(), ShardedConfig::default());
    }
}
