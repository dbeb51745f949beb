//! cohort-node: node-side library for the cohort runtime.
//!
//! Link this into every worker process of a cohort. [`Node::init`] opens
//! the single TCP connection to the hub, registers the node's id, and
//! blocks until the whole cohort is connected; after that the node can
//! exchange point-to-point messages, post named barriers, print remotely,
//! and run collectives.
//!
//! ```ignore
//! let node = Node::init(NodeConfig {
//!     host: "127.0.0.1".into(),
//!     port: 4950,
//!     id: rank,
//!     debug: false,
//! })
//! .await?;
//!
//! if node.id() == 0 {
//!     node.send(1, &vec![1, 2, 3, 4])?;
//! } else if node.id() == 1 {
//!     let values: Vec<i64> = node.recv_from_as(0).await?;
//! }
//!
//! let total = node.reduce_all(node.id(), |a, b| a + b).await?;
//! node.barrier(30).await?;
//! ```
//!
//! Collectives (reduce, gather, scatter, broadcast and the all-variants)
//! are hypercube dimension walks over point-to-point messages; see the
//! `collective` module docs. They are defined only for power-of-two
//! cohort sizes.

mod collective;
mod error;
mod inbound;
mod node;

pub use error::NodeError;
pub use node::{Node, NodeConfig};

// The reserved tag space is part of the node API contract: applications
// must keep their tags positive.
pub use cohort_wire::{tags, Message, ServiceCode};
