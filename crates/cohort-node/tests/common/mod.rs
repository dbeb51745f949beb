//! Shared harness: a hub on an ephemeral port plus an in-process cohort.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use cohort_hub::{Hub, HubConfig};
use cohort_node::{Node, NodeConfig};

/// Bind a hub for `expected_nodes` on an ephemeral port and serve it in
/// the background.
pub async fn start_hub(expected_nodes: u64) -> SocketAddr {
    let hub = Hub::bind(HubConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        expected_nodes,
        debug: false,
    })
    .await
    .expect("hub bind failed");
    let addr = hub.local_addr().expect("hub has no local addr");
    tokio::spawn(hub.serve());
    addr
}

/// Connect one node and wait for the cohort to assemble.
pub async fn join(addr: SocketAddr, id: i64) -> Node {
    Node::init(NodeConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        id,
        debug: false,
    })
    .await
    .expect("node init failed")
}

/// Start a hub and run `body` once per node id, all concurrently.
///
/// Node init blocks until the whole cohort is connected, so the bodies
/// must run as independent tasks. A cohort that fails to finish within
/// the deadline fails the test instead of hanging it.
pub async fn with_cohort<F, Fut>(n: u64, body: F)
where
    F: Fn(Node) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let addr = start_hub(n).await;

    let mut tasks = tokio::task::JoinSet::new();
    for id in 0..n as i64 {
        let body = body.clone();
        tasks.spawn(async move {
            let node = join(addr, id).await;
            body(node).await;
        });
    }

    tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(result) = tasks.join_next().await {
            result.expect("node task panicked");
        }
    })
    .await
    .expect("cohort did not finish in time");
}
