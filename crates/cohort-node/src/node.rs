//! Node connection manager and messaging API.
//!
//! A [`Node`] owns a single TCP connection to the hub and two background
//! tasks: a writer draining the outbound queue, and a reader that is the
//! only caller of the wire decoder. The reader demultiplexes: service
//! replies (negative source) are consumed internally (the Init reply sets
//! the cohort size, a Barrier release fires the matching latch) while
//! application messages land in the inbound buffer for `recv*` to claim.
//!
//! Transport failure is fatal to the node: once the reader exits, every
//! blocking call returns [`NodeError::Closed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use cohort_wire::{read_message, tags, write_message, Message, ServiceCode};

use crate::inbound::InboundBuffer;
use crate::NodeError;

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Hub host name or address.
    pub host: String,
    /// Hub service port.
    pub port: u16,
    /// This node's id. Ids must be contiguous `0..N-1` across the cohort.
    pub id: i64,
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

/// State shared with the reader task.
struct NodeShared {
    id: i64,
    inbound: InboundBuffer,
    /// Single-shot latches for posted barriers, keyed by tag. Structured
    /// like a pending-response table: register before sending the call,
    /// fire on the matching release.
    latches: Mutex<HashMap<i64, oneshot::Sender<()>>>,
    /// Waiter for the Init reply; consumed once during the handshake.
    init_reply: Mutex<Option<oneshot::Sender<u64>>>,
    closed: AtomicBool,
}

impl NodeShared {
    /// Tear down after the reader exits: wake every blocked consumer.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.inbound.close();
        // Dropping the senders errors out the waiting receivers.
        self.latches.lock().clear();
        self.init_reply.lock().take();
    }

    fn handle_service(&self, msg: Message) {
        match ServiceCode::from_i64(msg.source) {
            Some(ServiceCode::Init) => {
                let count = msg.tag as u64;
                match self.init_reply.lock().take() {
                    Some(waiter) => {
                        let _ = waiter.send(count);
                    }
                    None => tracing::warn!(id = self.id, "unexpected init reply"),
                }
            }
            Some(ServiceCode::Barrier) => {
                let tag = msg.tag;
                match self.latches.lock().remove(&tag) {
                    Some(latch) => {
                        let _ = latch.send(());
                    }
                    None => tracing::warn!(id = self.id, tag, "release for unposted barrier"),
                }
            }
            other => {
                tracing::warn!(id = self.id, source = msg.source, code = ?other, "unhandled service reply");
            }
        }
    }
}

/// A connected member of the cohort.
pub struct Node {
    shared: Arc<NodeShared>,
    outbound: mpsc::UnboundedSender<Message>,
    writer: tokio::task::JoinHandle<()>,
    node_count: u64,
}

impl Node {
    /// Connect to the hub, register this node's id, and wait until the
    /// whole cohort is connected.
    ///
    /// The handshake sends an Init call whose tag carries the id; the hub's
    /// reply carries the cohort size. Every node then posts the internal
    /// init barrier, so when `init` returns all `N` nodes are reachable.
    pub async fn init(config: NodeConfig) -> Result<Self, NodeError> {
        init_tracing(config.debug);
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        let (read_half, write_half) = stream.into_split();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (init_tx, init_rx) = oneshot::channel();

        let shared = Arc::new(NodeShared {
            id: config.id,
            inbound: InboundBuffer::new(),
            latches: Mutex::new(HashMap::new()),
            init_reply: Mutex::new(Some(init_tx)),
            closed: AtomicBool::new(false),
        });

        let writer = tokio::spawn(write_loop(write_half, out_rx));
        tokio::spawn(read_loop(shared.clone(), read_half));

        let mut node = Self {
            shared,
            outbound: out_tx,
            writer,
            node_count: 0,
        };

        node.send_service(ServiceCode::Init, config.id, Value::Null)?;
        node.node_count = init_rx.await.map_err(|_| NodeError::Closed)?;
        tracing::debug!(id = config.id, node_count = node.node_count, "cohort sized");

        node.barrier_any(tags::INIT_BARRIER).await?;
        tracing::debug!(id = config.id, "cohort connected");
        Ok(node)
    }

    /// This node's id.
    pub fn id(&self) -> i64 {
        self.shared.id
    }

    /// Cohort size, as reported by the hub's Init reply.
    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Send a payload to `sink` with tag 0. Returns as soon as the message
    /// is queued.
    pub fn send<T>(&self, sink: i64, payload: &T) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized,
    {
        self.send_tagged(sink, payload, 0)
    }

    /// Send a payload to `sink` with an application tag.
    pub fn send_tagged<T>(&self, sink: i64, payload: &T, tag: i64) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(payload).map_err(NodeError::Encode)?;
        self.enqueue(Message::new(self.shared.id, sink, tag, value))
    }

    /// Receive the next message from any source.
    pub async fn recv(&self) -> Result<Message, NodeError> {
        self.shared.inbound.pop(None).await
    }

    /// Receive the next message whose source is `source`, leaving other
    /// buffered messages in place.
    pub async fn recv_from(&self, source: i64) -> Result<Message, NodeError> {
        self.shared.inbound.pop(Some(source)).await
    }

    /// Receive from any source and decode the payload to `T`.
    ///
    /// A payload that does not decode to `T` is the caller's problem, not
    /// the transport's: the message is consumed and the decode error is
    /// returned.
    pub async fn recv_as<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        let msg = self.recv().await?;
        serde_json::from_value(msg.payload).map_err(NodeError::Decode)
    }

    /// Receive from `source` and decode the payload to `T`.
    pub async fn recv_from_as<T: DeserializeOwned>(&self, source: i64) -> Result<T, NodeError> {
        let msg = self.recv_from(source).await?;
        serde_json::from_value(msg.payload).map_err(NodeError::Decode)
    }

    /// Block until every node in the cohort has posted `tag`.
    ///
    /// Application tags must be positive; the non-positive range belongs to
    /// the runtime (see [`cohort_wire::tags`]).
    pub async fn barrier(&self, tag: i64) -> Result<(), NodeError> {
        debug_assert!(tag > 0, "barrier tags must be positive; tags <= 0 are reserved");
        self.barrier_any(tag).await
    }

    /// Barrier on any tag, including reserved ones. Engine use only.
    pub(crate) async fn barrier_any(&self, tag: i64) -> Result<(), NodeError> {
        let release = {
            let mut latches = self.shared.latches.lock();
            if self.shared.closed.load(Ordering::Acquire) {
                return Err(NodeError::Closed);
            }
            let (tx, rx) = oneshot::channel();
            let previous = latches.insert(tag, tx);
            debug_assert!(previous.is_none(), "barrier tag posted twice concurrently");
            rx
        };

        self.send_service(ServiceCode::Barrier, tag, Value::Null)?;
        release.await.map_err(|_| NodeError::Closed)
    }

    /// Print a value on the hub's standard output.
    pub fn print<T>(&self, value: &T) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(value).map_err(NodeError::Encode)?;
        self.send_service(ServiceCode::Print, 0, payload)
    }

    /// Fan a payload out to every node via the hub.
    ///
    /// With `exclude_self` set, the hub skips this node during fan-out;
    /// otherwise the copy addressed to this node arrives like any other
    /// inbound message.
    pub fn broadcast_msg<T>(&self, payload: &T, exclude_self: bool) -> Result<(), NodeError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(payload).map_err(NodeError::Encode)?;
        self.send_service(ServiceCode::Broadcast, exclude_self as i64, value)
    }

    /// Announce departure and close the connection.
    ///
    /// Consumes the node. The outbound queue is dropped after the Terminate
    /// call is queued, and the writer is awaited so everything already
    /// queued reaches the socket before it closes.
    pub async fn terminate(self, cause: &str) -> Result<(), NodeError> {
        tracing::debug!(id = self.shared.id, cause, "terminating");
        self.send_service(ServiceCode::Terminate, self.shared.id, Value::from(cause))?;

        let Self { writer, outbound, .. } = self;
        drop(outbound);
        let _ = writer.await;
        Ok(())
    }

    fn send_service(&self, code: ServiceCode, tag: i64, payload: Value) -> Result<(), NodeError> {
        self.enqueue(Message::service_call(code, self.shared.id, tag, payload))
    }

    fn enqueue(&self, msg: Message) -> Result<(), NodeError> {
        self.outbound.send(msg).map_err(|_| NodeError::Closed)
    }
}

/// Reader task: the only wire decoder on the node side.
async fn read_loop(shared: Arc<NodeShared>, read_half: OwnedReadHalf) {
    let mut reader = BufReader::new(read_half);
    loop {
        match read_message(&mut reader).await {
            Ok(Some(msg)) if msg.is_service_reply() => shared.handle_service(msg),
            Ok(Some(msg)) => shared.inbound.push(msg),
            Ok(None) => {
                tracing::debug!(id = shared.id, "hub closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(id = shared.id, error = %e, "reader loop terminated");
                break;
            }
        }
    }
    shared.close();
}

/// Writer task: drain the outbound queue onto the socket. Exits when every
/// queue sender is gone or the socket fails.
async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_message(&mut write_half, &msg).await {
            tracing::warn!(error = %e, "writer loop terminated");
            break;
        }
    }
}
