//! cohort-hub: the central coordinator.
//!
//! The hub binds a TCP port, accepts one connection per node, and routes
//! framed messages between them. Each accepted connection gets a dedicated
//! worker made of two tasks that share nothing mutable but the worker's
//! own outbound queue:
//!
//! - a reader loop: read one line, decode, dispatch. Service calls go to
//!   the control dispatcher; everything else is a registry lookup followed
//!   by an enqueue on the recipient worker's queue;
//! - a writer loop: dequeue, encode, write one line.
//!
//! Because one task reads each connection and one task writes each
//! connection, the order a sender's messages arrive at a given receiver is
//! the order they were sent. Cross-sender order is unspecified.
//!
//! A worker I/O failure is fatal to that worker only: its registry entry is
//! removed, queued messages are discarded, and the hub keeps serving the
//! rest of the cohort. Messages addressed to an unknown sink are silently
//! dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cohort_wire::Message;
use cohort_wire::{read_message, write_message};
use tracing_subscriber::EnvFilter;

mod barrier;
mod control;
mod registry;

pub use barrier::BarrierTable;
pub use registry::{OutboundSender, Registry};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to listen on. Port 0 picks an ephemeral port; read it back
    /// with [`Hub::local_addr`].
    pub addr: SocketAddr,
    /// Cohort size: the number of nodes expected to connect. Barrier
    /// counters initialize to this value.
    pub expected_nodes: u64,
    /// Default the log filter to `debug` instead of `info`.
    pub debug: bool,
}

/// Install the process-wide log subscriber for this config.
///
/// `RUST_LOG` overrides the config's default level, and a subscriber
/// installed earlier (by tests or an embedding application) wins.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// State shared by every per-client worker.
pub(crate) struct HubState {
    pub(crate) expected_nodes: u64,
    pub(crate) registry: Registry,
    pub(crate) barriers: BarrierTable,
}

impl HubState {
    pub(crate) fn new(expected_nodes: u64) -> Self {
        Self {
            expected_nodes,
            registry: Registry::new(),
            barriers: BarrierTable::new(),
        }
    }
}

/// A bound hub, ready to serve.
pub struct Hub {
    listener: TcpListener,
    state: Arc<HubState>,
}

impl Hub {
    /// Bind the service port.
    pub async fn bind(config: HubConfig) -> Result<Self, std::io::Error> {
        init_tracing(config.debug);
        if config.expected_nodes == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "expected node count must be at least 1",
            ));
        }
        let listener = TcpListener::bind(config.addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            expected_nodes = config.expected_nodes,
            "hub listening"
        );
        Ok(Self {
            listener,
            state: Arc::new(HubState::new(config.expected_nodes)),
        })
    }

    /// The address the hub is actually listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections forever, spawning a worker per client.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::debug!(%peer, "accepted connection");
            let state = self.state.clone();
            tokio::spawn(run_client(state, stream, peer));
        }
    }
}

/// Per-client worker: owns one connection for its whole lifetime.
async fn run_client(state: Arc<HubState>, stream: TcpStream, peer: SocketAddr) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_loop(write_half, rx));
    let registered = read_loop(&state, read_half, &tx).await;

    // Teardown: unregister, then drop the queue. Messages still queued are
    // discarded with it.
    if let Some(id) = registered {
        state.registry.remove(id, &tx);
    }
    drop(tx);
    writer.abort();
    tracing::debug!(%peer, id = ?registered, "worker closed");
}

/// Inbound half of a worker: decode and dispatch until EOF or error.
///
/// Returns the node id this connection registered, if any.
async fn read_loop(
    state: &HubState,
    read_half: OwnedReadHalf,
    tx: &OutboundSender,
) -> Option<i64> {
    let mut reader = BufReader::new(read_half);
    let mut registered = None;

    loop {
        match read_message(&mut reader).await {
            Ok(Some(msg)) if msg.is_service_call() => {
                control::dispatch(state, tx, &mut registered, msg);
            }
            Ok(Some(msg)) => route(state, msg),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "reader loop terminated");
                break;
            }
        }
    }

    registered
}

/// Deliver a point-to-point message to its sink's outbound queue.
fn route(state: &HubState, msg: Message) {
    match state.registry.lookup(msg.sink) {
        Some(dest) => {
            // Delivery to a torn-down worker is indistinguishable from a
            // lookup miss: the message is dropped either way.
            let _ = dest.send(msg);
        }
        None => {
            tracing::debug!(sink = msg.sink, source = msg.source, "dropping message for unknown sink");
        }
    }
}

/// Outbound half of a worker: drain the queue onto the socket.
async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_message(&mut write_half, &msg).await {
            tracing::warn!(error = %e, "writer loop terminated");
            break;
        }
    }
}
