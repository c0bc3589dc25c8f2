//! udp-kit: a UDP datagram server
//!
//! Serves one of the bundled protocols on a worker pool:
//! - `header`: fixed 20-byte binary datagrams, acknowledged with `GOT IT`
//! - `ping`: `PING` / `PONG`
//! - `echo`: every datagram back to its sender
//!
//! Configuration via CLI arguments or TOML file.

use tracing::info;
use tracing_subscriber::EnvFilter;
use udp_kit::config::{Config, ProtocolType};
use udp_kit::protocols::{echo::EchoHandler, header::HeaderHandler, ping::PingHandler};
use udp_kit::runtime::DatagramReader;
use udp_kit::{RequestHandler, Server, TraceId, UdpBinder, UdpWriter};

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
        protocol = ?config.protocol,
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        backpressure = ?config.backpressure,
        max_datagram_size = config.max_datagram_size,
        "Starting udp-kit server"
    );

    match config.protocol {
        ProtocolType::Header => run(config, HeaderHandler::new()),
        ProtocolType::Ping => run(config, PingHandler),
        ProtocolType::Echo => run(config, EchoHandler),
    }
}

/// Serve `handler` until the listener is closed.
fn run<Q>(config: Config, handler: Q) -> Result<(), Box<dyn std::error::Error>>
where
    Q: RequestHandler<DatagramReader>,
{
    let server = Server::new(config, UdpBinder, handler, UdpWriter);
    let handle = server.start(TraceId::new("udp"))?;

    let stats = handle.wait();
    info!(?stats, "Server exited");
    Ok(())
}
