//! Single-threaded mio event loop driver.
//!
//! Readiness-based model: poll tells us when the listener or a session
//! socket is ready, then we perform non-blocking accept/read/write
//! syscalls. Uses epoll on Linux, kqueue on macOS.
//!
//! Sessions live in a slab; the slot index doubles as the mio token, and
//! a slot is vacated only on the session's terminal transition. A stale
//! readiness event delivered after close finds an empty slot and is
//! dropped, so freed session state is never touched.

use crate::runtime::session::{Progress, Session, SessionState};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Event batch size per poll wake-up.
const EVENTS_CAPACITY: usize = 256;

/// Single-threaded cooperative driver: one thread multiplexes the accept
/// loop and every session's read/write cycle.
pub struct EventLoop {
    poll: Poll,
    listener: TcpListener,
    sessions: Slab<Session>,
    buffer_size: usize,
}

impl EventLoop {
    /// Bind the listening endpoint and register it with the poller.
    ///
    /// Bind failures (port in use, permission denied) are fatal and
    /// propagate to the caller.
    pub fn bind(addr: SocketAddr, buffer_size: usize) -> io::Result<Self> {
        let std_listener = create_listener(addr)?;
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll,
            listener,
            sessions: Slab::new(),
            buffer_size,
        })
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the event loop. Never returns except on a fatal poll error;
    /// per-session failures terminate that session only.
    pub fn run(mut self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "Event loop listening");

        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        loop {
            self.poll.poll(&mut events, None)?;

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.accept_ready(),
                    Token(id) => self.session_ready(id, event),
                }
            }
        }
    }

    /// Drain pending connections from the listener.
    ///
    /// The listener registration persists independently of any session, so
    /// the next accept is armed before a new session makes any progress; a
    /// slow or faulty session cannot stall admission. Accept errors are
    /// logged and never stop the loop.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = self.start_session(stream, peer) {
                        warn!(peer = %peer, error = %e, "Failed to start session");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Accept error");
                    break;
                }
            }
        }
    }

    fn start_session(
        &mut self,
        stream: mio::net::TcpStream,
        peer: SocketAddr,
    ) -> io::Result<()> {
        let id = self
            .sessions
            .insert(Session::new(stream, peer, self.buffer_size));

        // Re-borrow after insert to register with the slot's token.
        let session = &mut self.sessions[id];
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut session.stream, Token(id), Interest::READABLE)
        {
            self.sessions.remove(id);
            return Err(e);
        }

        debug!(conn_id = id, peer = %peer, "Accepted connection");
        Ok(())
    }

    fn session_ready(&mut self, id: usize, event: &mio::event::Event) {
        // Slot may have been vacated by an earlier event in this batch.
        if !self.sessions.contains(id) {
            return;
        }

        if event.is_readable() {
            self.drive(id, |s| s.on_readable());
        }

        if self.sessions.contains(id) && event.is_writable() {
            self.drive(id, |s| s.on_writable());
        }
    }

    /// Apply one session step and re-arm or tear down per its outcome.
    fn drive<F>(&mut self, id: usize, step: F)
    where
        F: FnOnce(&mut Session) -> io::Result<Progress>,
    {
        let session = &mut self.sessions[id];

        match step(session) {
            Ok(Progress::AwaitReadable) => {
                self.rearm(id, Interest::READABLE);
            }
            Ok(Progress::AwaitWritable) => {
                self.rearm(id, Interest::WRITABLE);
            }
            Ok(Progress::Pending) => {}
            Ok(Progress::Closed) => {
                // Clean peer shutdown: not an error.
                self.close_session(id);
            }
            Err(e) => {
                warn!(conn_id = id, error = %e, "Session error");
                self.sessions[id].close();
                self.close_session(id);
            }
        }
    }

    fn rearm(&mut self, id: usize, interest: Interest) {
        let session = &mut self.sessions[id];
        if let Err(e) = self
            .poll
            .registry()
            .reregister(&mut session.stream, Token(id), interest)
        {
            warn!(conn_id = id, error = %e, "Failed to re-arm session");
            session.close();
            self.close_session(id);
        }
    }

    fn close_session(&mut self, id: usize) {
        let mut session = self.sessions.remove(id);
        debug_assert_eq!(session.state(), SessionState::Closed);
        let _ = self.poll.registry().deregister(&mut session.stream);
        debug!(conn_id = id, peer = %session.peer, "Connection closed");
        // Dropping the session closes the socket in both directions.
    }
}

/// Create a non-blocking TCP listener bound to `addr`.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let server = EventLoop::bind("127.0.0.1:0".parse().unwrap(), 1024).unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_bind_conflict_is_fatal() {
        let first = EventLoop::bind("127.0.0.1:0".parse().unwrap(), 1024).unwrap();
        let addr = first.local_addr().unwrap();

        // SO_REUSEADDR does not allow two live listeners on one port.
        let second = std::net::TcpListener::bind(addr);
        assert!(second.is_err());
    }
}
