//! One TCP connection to a shard.
//!
//! A connection is never shared: the pool loans it to exactly one executor
//! at a time. Execution is a pipeline: every frame's payload is written
//! back to back, the writer is flushed once, then exactly as many replies
//! are read as frames were written, in order.

use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use protocol_resp::{ReplyReader, Value};
use tracing::debug;

use crate::command::Cmd;
use crate::error::Error;

pub(crate) struct Connection {
    sock: TcpStream,
    writer: BufWriter<TcpStream>,
    reader: ReplyReader<BufReader<TcpStream>>,
    timeout: Duration,
}

impl Connection {
    /// Dial `addr` and run the on-connect commands.
    ///
    /// Each on-connect command (AUTH, typically) is written and its reply
    /// read and discarded; any transport failure closes the socket and
    /// fails the creation. The reply content is intentionally not
    /// inspected, so a rejected AUTH only becomes visible through later
    /// command errors.
    pub(crate) fn connect(
        addr: &str,
        timeout: Duration,
        on_connect: &[Vec<u8>],
    ) -> Result<Connection, Error> {
        let target = addr
            .to_socket_addrs()
            .map_err(|e| Error::dial(addr, &e))?
            .next()
            .ok_or_else(|| Error::Dial {
                addr: addr.to_string(),
                msg: "no addresses resolved".into(),
            })?;

        let sock = TcpStream::connect_timeout(&target, timeout).map_err(|e| Error::dial(addr, &e))?;
        sock.set_nodelay(true).map_err(|e| Error::dial(addr, &e))?;

        let writer = BufWriter::new(sock.try_clone().map_err(|e| Error::dial(addr, &e))?);
        let reader = ReplyReader::new(BufReader::new(
            sock.try_clone().map_err(|e| Error::dial(addr, &e))?,
        ));

        let mut conn = Connection {
            sock,
            writer,
            reader,
            timeout,
        };

        for payload in on_connect {
            if let Err(err) = conn.run_on_connect(payload) {
                debug!(%addr, error = %err, "on-connect command failed");
                return Err(Error::Dial {
                    addr: addr.to_string(),
                    msg: err.to_string(),
                });
            }
        }

        debug!(%addr, "connected");
        Ok(conn)
    }

    fn run_on_connect(&mut self, payload: &[u8]) -> Result<(), Error> {
        let deadline = Instant::now() + self.timeout;
        self.set_write_deadline(deadline)?;
        self.writer.write_all(payload).map_err(|e| Error::io(&e))?;
        self.writer.flush().map_err(|e| Error::io(&e))?;
        self.set_read_deadline(deadline)?;
        self.reader.next().map_err(Error::from)?;
        Ok(())
    }

    /// Run one pipeline over this connection.
    ///
    /// On success every frame holds its own outcome and the connection may
    /// be reused. On failure the current and all remaining frames hold the
    /// shard-wide error, the same error is returned, and the connection
    /// must be discarded. A server error reply only fails its own frame;
    /// the session is still valid.
    pub(crate) fn execute(&mut self, frames: &mut [&mut Cmd]) -> Result<(), Error> {
        let deadline = Instant::now() + self.timeout;

        if let Err(err) = self.write_pipeline(&*frames, deadline) {
            for frame in frames.iter_mut() {
                frame.fail(err.clone());
            }
            return Err(err);
        }

        for i in 0..frames.len() {
            match self.read_reply(deadline) {
                Ok(Value::Error(msg)) => {
                    frames[i].finish(Err(Error::Server(
                        String::from_utf8_lossy(&msg).into_owned(),
                    )));
                }
                Ok(value) => frames[i].finish(Ok(value)),
                Err(err) => {
                    for frame in frames[i..].iter_mut() {
                        frame.fail(err.clone());
                    }
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    fn write_pipeline(&mut self, frames: &[&mut Cmd], deadline: Instant) -> Result<(), Error> {
        self.set_write_deadline(deadline)?;
        for frame in frames {
            self.writer
                .write_all(frame.payload())
                .map_err(|e| Error::io(&e))?;
        }
        self.writer.flush().map_err(|e| Error::io(&e))
    }

    fn read_reply(&mut self, deadline: Instant) -> Result<Value, Error> {
        self.set_read_deadline(deadline)?;
        self.reader.next().map_err(Error::from)
    }

    fn set_read_deadline(&self, deadline: Instant) -> Result<(), Error> {
        self.sock
            .set_read_timeout(Some(Self::remaining(deadline)?))
            .map_err(|e| Error::io(&e))
    }

    fn set_write_deadline(&self, deadline: Instant) -> Result<(), Error> {
        self.sock
            .set_write_timeout(Some(Self::remaining(deadline)?))
            .map_err(|e| Error::io(&e))
    }

    /// Budget left until `deadline`. The whole pipeline shares one
    /// deadline, translated into per-syscall socket timeouts.
    fn remaining(deadline: Instant) -> Result<Duration, Error> {
        deadline
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
            .ok_or_else(|| Error::Io("pipeline deadline exceeded".into()))
    }
}
