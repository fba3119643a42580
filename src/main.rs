//! tcp-echo: a minimal byte-echo TCP server.
//!
//! Usage: `tcp-echo <port>`. The server binds the given port, accepts
//! connections forever, and echoes every byte each peer sends. The
//! concurrency driver (event loop or thread-per-connection) is selectable
//! via CLI flag or TOML config file.

use tcp_echo::config::{Config, ConfigError};
use tcp_echo::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; usage errors exit before any network resource
    // is created.
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Usage(e)) => {
            if e.use_stderr() {
                let _ = e.print();
                std::process::exit(1);
            }
            // --help / --version
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        runtime = ?config.runtime,
        buffer_size = config.buffer_size,
        "Starting tcp-echo server"
    );

    // A bind or poll failure propagates here; the accept loop itself
    // never exits on its own.
    runtime::run(config)?;
    Ok(())
}
