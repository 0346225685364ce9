//! Bounded connection pool.
//!
//! A pool holds exactly `capacity` slots. A slot is either a live
//! connection or empty; empty slots are dialed by the borrower, which lets
//! the shard apply its reconnect throttle. Because `acquire` blocks until a
//! slot is free, a loaded shard serializes excess callers instead of
//! opening more sockets.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::conn::Connection;
use crate::error::Error;

pub(crate) struct Pool {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: usize,
}

struct Inner {
    slots: VecDeque<Option<Connection>>,
    closed: bool,
}

impl Pool {
    pub(crate) fn new(capacity: usize) -> Pool {
        let slots = (0..capacity).map(|_| None).collect();
        Pool {
            inner: Mutex::new(Inner {
                slots,
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Borrow a slot, blocking while all of them are checked out.
    ///
    /// `Ok(None)` means the slot is empty and the borrower must dial.
    /// Every successful acquire must be paired with a [`release`](Pool::release).
    pub(crate) fn acquire(&self) -> Result<Option<Connection>, Error> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return Err(Error::Closed);
            }
            if let Some(slot) = inner.slots.pop_front() {
                return Ok(slot);
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return a slot. Pass `None` to leave the slot empty and force a
    /// re-dial on next use (after a broken pipeline or a failed dial).
    pub(crate) fn release(&self, conn: Option<Connection>) {
        let mut inner = self.lock();
        inner.slots.push_back(conn);
        drop(inner);
        self.available.notify_all();
    }

    /// Close the pool: pending and future acquires fail, and the call
    /// blocks until every loaned slot has been returned, then drops any
    /// live connections.
    pub(crate) fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        self.available.notify_all();

        while inner.slots.len() < self.capacity {
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let live = inner.slots.iter().filter(|s| s.is_some()).count();
        inner.slots.clear();
        debug!(live, capacity = self.capacity, "pool closed");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_with_capacity_empty_slots() {
        let pool = Pool::new(3);
        for _ in 0..3 {
            assert!(pool.acquire().unwrap().is_none());
        }
        // all three slots are out; put them back
        for _ in 0..3 {
            pool.release(None);
        }
    }

    #[test]
    fn acquire_blocks_until_release() {
        let pool = Pool::new(1);
        let slot = pool.acquire().unwrap();
        assert!(slot.is_none());

        thread::scope(|s| {
            let waiter = s.spawn(|| pool.acquire().unwrap());
            // give the waiter time to block on the empty pool
            thread::sleep(Duration::from_millis(20));
            assert!(!waiter.is_finished());
            pool.release(None);
            assert!(waiter.join().unwrap().is_none());
            pool.release(None);
        });
    }

    #[test]
    fn close_fails_pending_and_future_acquires() {
        let pool = Pool::new(1);
        let _slot = pool.acquire().unwrap();

        thread::scope(|s| {
            let waiter = s.spawn(|| pool.acquire());
            let closer = s.spawn(|| pool.close());
            thread::sleep(Duration::from_millis(20));
            // close blocks until the loaned slot comes back
            assert!(!closer.is_finished());
            pool.release(None);
            closer.join().unwrap();
            assert!(matches!(waiter.join().unwrap(), Err(Error::Closed)));
        });

        assert!(matches!(pool.acquire(), Err(Error::Closed)));
    }

    #[test]
    fn close_twice_is_a_no_op() {
        let pool = Pool::new(2);
        pool.close();
        pool.close();
    }
}
