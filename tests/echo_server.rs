//! Black-box tests for the echo contract, run against both drivers.
//!
//! Each test binds an ephemeral port, runs the server on a background
//! thread, and talks to it with plain std TCP clients.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use tcp_echo::runtime::{BlockingServer, EventLoop};

const BUFFER_SIZE: usize = 1024;
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum Driver {
    EventLoop,
    Blocking,
}

/// Start a server with the given driver on an ephemeral port.
///
/// The accept loop never exits on its own; the thread is left detached
/// and dies with the test process.
fn start(driver: Driver) -> SocketAddr {
    let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    match driver {
        Driver::EventLoop => {
            let server = EventLoop::bind(bind_addr, BUFFER_SIZE).unwrap();
            let addr = server.local_addr().unwrap();
            thread::spawn(move || server.run());
            addr
        }
        Driver::Blocking => {
            let server = BlockingServer::bind(bind_addr, BUFFER_SIZE).unwrap();
            let addr = server.local_addr().unwrap();
            thread::spawn(move || server.run());
            addr
        }
    }
}

fn with_each_driver(test: impl Fn(SocketAddr)) {
    for driver in [Driver::EventLoop, Driver::Blocking] {
        test(start(driver));
    }
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(CLIENT_TIMEOUT)).unwrap();
    stream
}

/// Send a payload and assert the identical bytes come back.
fn assert_echo(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).unwrap();
    let mut echoed = vec![0u8; payload.len()];
    stream.read_exact(&mut echoed).unwrap();
    assert_eq!(echoed, payload);
}

#[test]
fn echo_identity_small_payloads() {
    with_each_driver(|addr| {
        let mut stream = connect(addr);
        assert_echo(&mut stream, b"ping");
        assert_echo(&mut stream, b"a");
        assert_echo(&mut stream, b"hello, echo server");
    });
}

#[test]
fn echo_identity_across_multiple_cycles() {
    with_each_driver(|addr| {
        let mut stream = connect(addr);
        // Several request/response rounds on one connection.
        for i in 0..10u8 {
            let payload = vec![i; 64];
            assert_echo(&mut stream, &payload);
        }
    });
}

#[test]
fn payload_larger_than_buffer_is_fully_echoed() {
    with_each_driver(|addr| {
        let mut stream = connect(addr);

        // 5000 bytes through a 1024-byte buffer: multiple read/write
        // cycles, byte-stream semantics, order preserved.
        let payload: Vec<u8> = (0..5000usize).map(|i| (i % 251) as u8).collect();
        stream.write_all(&payload).unwrap();

        let mut echoed = vec![0u8; payload.len()];
        stream.read_exact(&mut echoed).unwrap();
        assert_eq!(echoed, payload);
    });
}

#[test]
fn clean_close_after_half_close() {
    with_each_driver(|addr| {
        let mut stream = connect(addr);

        // Scenario: send "ping", get "ping" back, then half-close.
        assert_echo(&mut stream, b"ping");
        stream.shutdown(Shutdown::Write).unwrap();

        // The server observes end-of-stream and closes its side.
        let mut rest = Vec::new();
        let n = stream.read_to_end(&mut rest).unwrap();
        assert_eq!(n, 0);
    });
}

#[test]
fn immediate_half_close_yields_no_bytes() {
    with_each_driver(|addr| {
        let mut stream = connect(addr);
        stream.shutdown(Shutdown::Write).unwrap();

        let mut rest = Vec::new();
        let n = stream.read_to_end(&mut rest).unwrap();
        assert_eq!(n, 0);
    });
}

#[test]
fn concurrent_sessions_are_independent() {
    with_each_driver(|addr| {
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                thread::spawn(move || {
                    let mut stream = connect(addr);
                    // Distinct payload per client, spanning buffer cycles.
                    let payload = vec![i + 1; 2048 + i as usize];
                    stream.write_all(&payload).unwrap();

                    let mut echoed = vec![0u8; payload.len()];
                    stream.read_exact(&mut echoed).unwrap();
                    assert_eq!(echoed, payload, "client {i} got foreign bytes");
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    });
}

#[test]
fn idle_session_does_not_block_new_connections() {
    with_each_driver(|addr| {
        // First session sits idle mid-cycle, holding its thread or slot.
        let _idle = connect(addr);

        // A new client is still admitted and served promptly.
        let mut stream = connect(addr);
        assert_echo(&mut stream, b"still serving");
    });
}

#[test]
fn dropped_session_does_not_stop_the_accept_loop() {
    with_each_driver(|addr| {
        // A client that sends data and disappears without reading the
        // echo. Depending on timing the server sees end-of-stream or a
        // reset; either way later connections must be unaffected.
        {
            let mut abandoned = connect(addr);
            abandoned.write_all(&[0u8; 4096]).unwrap();
        }

        let mut stream = connect(addr);
        assert_echo(&mut stream, b"unaffected");
    });
}
