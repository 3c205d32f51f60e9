//! frame-echo client binary.
//!
//! Sends each message as a frame, pipelined, then prints the replies in
//! order.

use clap::Parser;
use frame_echo::client::Client;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "frame-echo-client")]
#[command(version = "0.1.0")]
#[command(about = "Send framed requests to a frame-echo server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    addr: String,

    /// Seconds to wait for each reply
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Messages to send
    #[arg(default_values_t = ["hello1".to_string(), "hello2".to_string(), "hello3".to_string()])]
    messages: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut client = Client::connect(&args.addr)?;
    client.set_read_timeout(Some(Duration::from_secs(args.timeout)))?;

    let replies = client.pipeline(&args.messages)?;
    for reply in replies {
        info!(len = reply.len(), reply = %String::from_utf8_lossy(&reply), "Server replied");
    }
    Ok(())
}
