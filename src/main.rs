//! frame-echo server binary.
//!
//! Serves the length-prefixed echo protocol on a single thread:
//! - Many concurrent connections over one readiness poll loop
//! - Pipelined requests answered in order
//! - Optional idle-connection expiry
//! - Configuration via CLI arguments or TOML file

use frame_echo::config::Config;
use frame_echo::protocols::Echo;
use frame_echo::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        max_connections = config.max_connections,
        "Starting frame-echo server"
    );

    runtime::run(&config, Echo)?;
    Ok(())
}
