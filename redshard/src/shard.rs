//! One shard: a label, an address, and a pool of connections.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::client::LogFn;
use crate::command::Cmd;
use crate::conn::Connection;
use crate::error::Error;
use crate::pool::Pool;

/// How long dials are suppressed after a failed one. Commands arriving
/// inside the window fail immediately with the cached error instead of
/// queueing behind connect attempts against a dead server.
const REDIAL_BACKOFF: Duration = Duration::from_millis(50);

pub(crate) struct Shard {
    label: String,
    addr: String,
    pool: Pool,
    connect_timeout: Duration,
    on_connect: Arc<Vec<Vec<u8>>>,
    redial: Mutex<Redial>,
}

#[derive(Default)]
struct Redial {
    failed_at: Option<Instant>,
    error: Option<Error>,
}

impl Shard {
    pub(crate) fn new(
        label: String,
        addr: String,
        pool_size: usize,
        connect_timeout: Duration,
        on_connect: Arc<Vec<Vec<u8>>>,
    ) -> Shard {
        Shard {
            label,
            addr,
            pool: Pool::new(pool_size),
            connect_timeout,
            on_connect,
            redial: Mutex::new(Redial::default()),
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn addr(&self) -> &str {
        &self.addr
    }

    pub(crate) fn close(&self) {
        self.pool.close();
    }

    /// Run one sub-batch on a borrowed connection.
    ///
    /// Every frame ends up with an outcome: replies on success, the
    /// shard-wide error on dial/pipeline failure. The log callback fires
    /// once per batch with the wall time of the pipeline, reported as zero
    /// when anything failed.
    pub(crate) fn exec(&self, mut frames: Vec<&mut Cmd>, log: Option<&LogFn>) {
        let batch = frames.len();

        let slot = match self.pool.acquire() {
            Ok(slot) => slot,
            Err(err) => return self.fail_batch(frames, err, log),
        };

        let mut conn = match slot {
            Some(conn) => conn,
            None => match self.dial() {
                Ok(conn) => conn,
                Err(err) => {
                    self.pool.release(None);
                    return self.fail_batch(frames, err, log);
                }
            },
        };

        let start = Instant::now();
        match conn.execute(&mut frames) {
            Ok(()) => {
                let elapsed = start.elapsed();
                self.pool.release(Some(conn));
                if let Some(log) = log {
                    log(&self.label, batch, elapsed, None);
                }
            }
            Err(err) => {
                // the socket is closed with the connection
                drop(conn);
                self.pool.release(None);
                debug!(shard = %self.label, error = %err, "pipeline failed, connection dropped");
                if let Some(log) = log {
                    log(&self.label, batch, Duration::ZERO, Some(&err));
                }
            }
        }
    }

    fn fail_batch(&self, frames: Vec<&mut Cmd>, err: Error, log: Option<&LogFn>) {
        let batch = frames.len();
        for frame in frames {
            frame.fail(err.clone());
        }
        if let Some(log) = log {
            log(&self.label, batch, Duration::ZERO, Some(&err));
        }
    }

    /// Dial a fresh connection for an empty slot, honoring the backoff
    /// window left by the previous failure.
    fn dial(&self) -> Result<Connection, Error> {
        {
            let redial = self.redial_state();
            if let (Some(at), Some(err)) = (redial.failed_at, redial.error.as_ref()) {
                if at.elapsed() < REDIAL_BACKOFF {
                    return Err(err.clone());
                }
            }
        }

        match Connection::connect(&self.addr, self.connect_timeout, &self.on_connect) {
            Ok(conn) => {
                *self.redial_state() = Redial::default();
                Ok(conn)
            }
            Err(err) => {
                warn!(shard = %self.label, addr = %self.addr, error = %err, "dial failed");
                let mut redial = self.redial_state();
                redial.failed_at = Some(Instant::now());
                redial.error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn redial_state(&self) -> MutexGuard<'_, Redial> {
        self.redial.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
