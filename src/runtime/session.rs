//! Connection session state machine.
//!
//! Each session owns one accepted connection and a fixed-size buffer, and
//! cycles read -> echo -> write -> read until the peer closes or an I/O
//! error occurs. Read and write strictly alternate: a read must complete
//! before the write begins, and the write must finish before the next read
//! is issued.

use crate::echo;
use mio::net::TcpStream;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use tracing::trace;

/// Current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the peer to send data.
    Reading,
    /// Transmitting the echoed bytes back.
    Writing {
        /// Bytes already written.
        written: usize,
        /// Total bytes to write.
        total: usize,
    },
    /// Terminal: the connection is finished and the slot can be freed.
    Closed,
}

/// Outcome of driving a session on a readiness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Re-arm the session for read readiness.
    AwaitReadable,
    /// Re-arm the session for write readiness.
    AwaitWritable,
    /// Nothing to do yet; keep the current registration.
    Pending,
    /// The session reached its terminal state cleanly.
    Closed,
}

/// A single client session.
#[derive(Debug)]
pub struct Session {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    state: SessionState,
    buf: Box<[u8]>,
}

impl Session {
    /// Create a new session in the initial reading state.
    pub fn new(stream: TcpStream, peer: SocketAddr, buffer_size: usize) -> Self {
        Self {
            stream,
            peer,
            state: SessionState::Reading,
            buf: vec![0u8; buffer_size].into_boxed_slice(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the reading half of the cycle on a readable event.
    ///
    /// A successful read of `n > 0` bytes runs the echo transform and
    /// schedules the response; end-of-stream closes the session cleanly.
    /// A wake-up that yields no bytes (`WouldBlock`) re-arms the read
    /// rather than closing.
    pub fn on_readable(&mut self) -> io::Result<Progress> {
        if self.state != SessionState::Reading {
            return Ok(Progress::Pending);
        }

        match self.stream.read(&mut self.buf) {
            Ok(0) => {
                // End-of-stream: the peer closed its send side.
                trace!(peer = %self.peer, "end-of-stream");
                self.state = SessionState::Closed;
                Ok(Progress::Closed)
            }
            Ok(n) => {
                let total = echo::respond_in_place(&mut self.buf[..n]);
                trace!(peer = %self.peer, bytes = n, "read chunk");
                self.state = SessionState::Writing { written: 0, total };
                Ok(Progress::AwaitWritable)
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(Progress::Pending)
            }
            Err(e) => Err(e),
        }
    }

    /// Drive the writing half of the cycle on a writable event.
    ///
    /// Writes until the scheduled byte count is fully transmitted or the
    /// socket reports `WouldBlock` (events are edge-triggered, so a short
    /// write must not wait for an edge that never comes). On completion
    /// the session issues a new read.
    pub fn on_writable(&mut self) -> io::Result<Progress> {
        let (mut written, total) = match self.state {
            SessionState::Writing { written, total } => (written, total),
            _ => return Ok(Progress::Pending),
        };

        while written < total {
            match self.stream.write(&self.buf[written..total]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write returned 0",
                    ))
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.state = SessionState::Writing { written, total };
                    return Ok(Progress::Pending);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        trace!(peer = %self.peer, bytes = total, "echoed chunk");
        self.state = SessionState::Reading;
        Ok(Progress::AwaitReadable)
    }

    /// Mark the session terminal. The stream is closed when the session
    /// is dropped.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
