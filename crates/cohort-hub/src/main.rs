//! cohort-hub binary.
//!
//! Usage:
//!
//! ```bash
//! cohort-hub <port> <expected-node-count> [--debug]
//! ```
//!
//! Binds the service port, then accepts and routes until killed.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

use cohort_hub::{Hub, HubConfig};

#[derive(Parser, Debug)]
#[command(name = "cohort-hub")]
#[command(about = "Central coordinator for a cohort of nodes")]
struct Args {
    /// Service port to listen on.
    port: u16,

    /// Number of nodes expected to connect.
    expected_node_count: u64,

    /// Log at debug level.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();

    let config = HubConfig {
        addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port),
        expected_nodes: args.expected_node_count,
        debug: args.debug,
    };
    let hub = Hub::bind(config).await?;
    hub.serve().await
}
