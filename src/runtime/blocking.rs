//! Thread-per-connection blocking driver.
//!
//! Each accepted connection gets a dedicated OS thread running the
//! read -> echo -> write cycle with blocking syscalls. Sessions own
//! disjoint state, so no synchronization is needed; the listener is only
//! ever touched by the accept loop. There is no cap on concurrent
//! connections, matching the reference behavior.

use crate::echo;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use tracing::{debug, error, info, trace, warn};

/// Blocking driver: one thread per session.
pub struct BlockingServer {
    listener: TcpListener,
    buffer_size: usize,
}

impl BlockingServer {
    /// Bind the listening endpoint. Bind failures are fatal and propagate.
    pub fn bind(addr: SocketAddr, buffer_size: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            buffer_size,
        })
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, spawning a session thread per peer.
    ///
    /// The loop never waits on spawned threads and never stops accepting:
    /// any failure admitting or serving one connection is logged and the
    /// next accept proceeds.
    pub fn run(self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "Blocking server listening");

        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Accept error");
                    continue;
                }
            };

            debug!(peer = %peer, "Accepted connection");

            let buffer_size = self.buffer_size;
            let spawned = thread::Builder::new()
                .name(format!("conn-{peer}"))
                .spawn(move || {
                    match serve(stream, buffer_size) {
                        Ok(()) => debug!(peer = %peer, "Connection closed"),
                        Err(e) => warn!(peer = %peer, error = %e, "Session error"),
                    }
                });

            if let Err(e) = spawned {
                warn!(peer = %peer, error = %e, "Failed to spawn session thread");
            }
        }
    }
}

/// Serve one session: blocking read/echo/write until end-of-stream.
///
/// End-of-stream is a clean return, not an error. Interrupted reads are
/// retried; any other I/O error ends this session only.
fn serve(mut stream: TcpStream, buffer_size: usize) -> io::Result<()> {
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                trace!("end-of-stream");
                return Ok(());
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let total = echo::respond_in_place(&mut buf[..n]);
        stream.write_all(&buf[..total])?;
    }
}
