//! tcp-echo: a minimal byte-echo TCP server.
//!
//! Accepts stream connections, reads whatever bytes a peer sends, and
//! writes those same bytes back until the peer closes or an I/O error
//! occurs. Two interchangeable concurrency drivers implement the same
//! echo contract:
//! - a blocking thread-per-connection model
//! - a single-threaded readiness event loop (mio)

pub mod config;
pub mod echo;
pub mod runtime;
