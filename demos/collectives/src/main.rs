//! Demo node host.
//!
//! Start a hub, then launch one of these per node id:
//!
//! ```bash
//! cohort-hub 4950 4 &
//! for id in 0 1 2 3; do collectives 127.0.0.1 4950 $id & done
//! ```
//!
//! Every rank walks the same script: a point-to-point exchange between
//! ranks 0 and 1, a named barrier, one of each collective, and a remote
//! print reporting what the rank observed.

use clap::Parser;

use cohort_node::{Node, NodeConfig, NodeError};

#[derive(Parser, Debug)]
#[command(name = "collectives")]
#[command(about = "Cohort node exercising the full runtime API")]
struct Args {
    /// Hub host name or address.
    hub_host: String,

    /// Hub service port.
    hub_port: u16,

    /// This node's id (0..N-1, assigned by the launcher).
    node_id: i64,

    /// Log at debug level.
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    let args = Args::parse();

    let node = Node::init(NodeConfig {
        host: args.hub_host,
        port: args.hub_port,
        id: args.node_id,
        debug: args.debug,
    })
    .await?;

    let me = node.id();
    let n = node.node_count() as i64;
    node.print(&format!("rank {me} of {n} joined"))?;

    // Point-to-point: rank 0 greets rank 1.
    if n >= 2 {
        if me == 0 {
            node.send(1, &vec![1i64, 2, 3, 4])?;
        } else if me == 1 {
            let values: Vec<i64> = node.recv_from_as(0).await?;
            node.print(&format!("rank 1 received {values:?} from rank 0"))?;
        }
        node.barrier(1).await?;
    }

    // Broadcast rank 0's answer everywhere.
    let answer = node.broadcast(0, (me == 0).then_some(42i64)).await?;
    node.print(&format!("rank {me} holds broadcast value {answer}"))?;

    // Scatter two elements per rank from rank 0, then gather them back.
    let deck = (me == 0).then(|| (0..2 * n).collect::<Vec<i64>>());
    let slice = node.scatter(0, deck).await?;
    node.print(&format!("rank {me} owns slice {slice:?}"))?;

    if let Some(regathered) = node.gather(0, slice).await? {
        node.print(&format!("rank 0 regathered {regathered:?}"))?;
    }

    // Everyone learns the cohort-wide sum of ranks.
    let total = node.reduce_all(me, |a, b| a + b).await?;
    node.print(&format!("rank {me} sees rank-sum {total}"))?;

    node.terminate("demo complete").await?;
    Ok(())
}
