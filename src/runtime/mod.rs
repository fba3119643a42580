//! Concurrency drivers for the echo service.
//!
//! Two interchangeable strategies for the identical echo contract:
//! - `BlockingServer`: one blocking OS thread per connection.
//! - `EventLoop`: a single-threaded readiness event loop (mio) that
//!   multiplexes the accept loop and every session's cycle.

mod blocking;
mod event_loop;
mod session;

pub use blocking::BlockingServer;
pub use event_loop::EventLoop;
pub use session::{Progress, Session, SessionState};

use crate::config::{Config, RuntimeType};
use std::io;
use std::net::SocketAddr;

/// Run the server with the configured driver. Returns only on a fatal
/// bind or poll error.
pub fn run(config: Config) -> io::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    match config.runtime {
        RuntimeType::EventLoop => EventLoop::bind(addr, config.buffer_size)?.run(),
        RuntimeType::Blocking => BlockingServer::bind(addr, config.buffer_size)?.run(),
    }
}
