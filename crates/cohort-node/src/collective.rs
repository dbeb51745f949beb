//! Collective operations over hypercube dimension walks.
//!
//! All collectives here are built from point-to-point sends and receives;
//! the hub contributes nothing beyond per-pair delivery. With `N = 2^k`
//! nodes, the engine walks the `k` hypercube dimensions; at dimension `d`
//! a node's partner is its id with bit `d` flipped, and the direction of
//! transfer follows the corresponding bit of the root id.
//!
//! Every collective ends with an internal completion barrier on a reserved
//! tag. The barriers are load-bearing: without them a node that finishes
//! early could inject a send for the next collective that a partner still
//! in the previous one would dequeue.
//!
//! Collectives are defined only for power-of-two cohorts; entry points
//! assert that in debug builds.

use serde::de::DeserializeOwned;
use serde::Serialize;

use cohort_wire::tags;

use crate::{Node, NodeError};

/// Number of hypercube dimensions for a cohort of `n` nodes.
fn dims(n: u64) -> u32 {
    n.trailing_zeros()
}

/// True if, walking dimensions low to high for a fold toward `root`, `me`
/// hands its accumulator to its partner at dimension `d`.
///
/// A node sends at the lowest dimension where its id differs from the
/// root's, which steers every accumulator toward the root; until then it
/// receives from partners on the far side of each lower dimension.
fn sends_at(root: i64, me: i64, d: u32) -> bool {
    ((root ^ me) >> d) & 1 == 1
}

/// The dimension at which `me` first receives a value broadcast by `root`:
/// the highest bit where the two ids differ.
fn first_recv_dim(root: i64, me: i64) -> u32 {
    debug_assert_ne!(root, me);
    u64::BITS - 1 - ((root ^ me) as u64).leading_zeros()
}

impl Node {
    /// Fold every node's `value` into a single result at `root` using the
    /// associative operator `f`.
    ///
    /// Returns `Some` at the root, `None` everywhere else. The fold order
    /// is the engine's fixed pair order, so `f` must be associative (and
    /// commutative operators are insensitive to the order entirely).
    pub async fn reduce<T, F>(&self, root: i64, value: T, mut f: F) -> Result<Option<T>, NodeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T, T) -> T,
    {
        let n = self.node_count();
        let me = self.id();
        debug_assert!(n.is_power_of_two(), "collectives require a power-of-two cohort");
        debug_assert!((0..n as i64).contains(&root));

        let mut acc = value;
        for d in 0..dims(n) {
            let partner = me ^ (1i64 << d);
            if sends_at(root, me, d) {
                self.send_tagged(partner, &acc, tags::FOLD_DATA)?;
                break;
            }
            let received: T = self.recv_from_as(partner).await?;
            acc = f(received, acc);
        }

        self.barrier_any(tags::REDUCE_BARRIER).await?;
        Ok((me == root).then_some(acc))
    }

    /// Collect every node's `items` at `root`, preserving node-id order.
    ///
    /// Same walk as [`Node::reduce`], but the accumulator is a list and the
    /// combine step is order-preserving concatenation: a receiver appends
    /// lists arriving from the high side of a dimension and prepends lists
    /// from the low side. Returns `Some` at the root, `None` elsewhere.
    pub async fn gather<T>(&self, root: i64, items: Vec<T>) -> Result<Option<Vec<T>>, NodeError>
    where
        T: Serialize + DeserializeOwned,
    {
        let n = self.node_count();
        let me = self.id();
        debug_assert!(n.is_power_of_two(), "collectives require a power-of-two cohort");
        debug_assert!((0..n as i64).contains(&root));

        let mut list = items;
        for d in 0..dims(n) {
            let mask = 1i64 << d;
            let partner = me ^ mask;
            if sends_at(root, me, d) {
                self.send_tagged(partner, &list, tags::FOLD_DATA)?;
                break;
            }
            let mut received: Vec<T> = self.recv_from_as(partner).await?;
            if me & mask == 0 {
                // Partner is the high half of the pair: its ids follow ours.
                list.append(&mut received);
            } else {
                received.append(&mut list);
                list = received;
            }
        }

        self.barrier_any(tags::GATHER_BARRIER).await?;
        Ok((me == root).then_some(list))
    }

    /// Distribute contiguous slices of `items` from `source` across the
    /// cohort, in node-id order; node `i` receives the `i`-th slice.
    ///
    /// Only the source passes the list. Dimensions are walked high to low;
    /// a node joins the walk at dimension `d` only once its low-`d` id bits
    /// match the source's, receives its fragment, then keeps bisecting.
    /// When a fragment of odd length splits, the low half gets the extra
    /// element.
    pub async fn scatter<T>(&self, source: i64, items: Option<Vec<T>>) -> Result<Vec<T>, NodeError>
    where
        T: Serialize + DeserializeOwned,
    {
        let n = self.node_count();
        let me = self.id();
        debug_assert!(n.is_power_of_two(), "collectives require a power-of-two cohort");
        debug_assert!((0..n as i64).contains(&source));
        debug_assert!(me != source || items.is_some(), "scatter source must supply the list");

        let mut list = if me == source {
            items.unwrap_or_default()
        } else {
            Vec::new()
        };
        let mut holding = me == source;

        for d in (0..dims(n)).rev() {
            let mask = 1i64 << d;
            if me & (mask - 1) != source & (mask - 1) {
                // Not yet on the distribution path rooted at the source.
                continue;
            }
            let partner = me ^ mask;
            if holding {
                let split = list.len().div_ceil(2);
                let high = list.split_off(split);
                if me & mask == 0 {
                    // Low side keeps the low fragment.
                    self.send_tagged(partner, &high, tags::FOLD_DATA)?;
                } else {
                    self.send_tagged(partner, &list, tags::FOLD_DATA)?;
                    list = high;
                }
            } else {
                list = self.recv_from_as(partner).await?;
                holding = true;
            }
        }

        self.barrier_any(tags::SCATTER_BARRIER).await?;
        Ok(list)
    }

    /// Replicate the root's `value` on every node.
    ///
    /// Only the root passes the value. A node first receives at the highest
    /// dimension where its id differs from the root's, then relays on every
    /// higher dimension; the root relays on all of them.
    pub async fn broadcast<T>(&self, root: i64, value: Option<T>) -> Result<T, NodeError>
    where
        T: Serialize + DeserializeOwned,
    {
        let n = self.node_count();
        let me = self.id();
        debug_assert!(n.is_power_of_two(), "collectives require a power-of-two cohort");
        debug_assert!((0..n as i64).contains(&root));
        debug_assert!(me != root || value.is_some(), "broadcast root must supply the value");

        let mut held = if me == root { value } else { None };
        let first = if me == root { 0 } else { first_recv_dim(root, me) };

        for d in first..dims(n) {
            let partner = me ^ (1i64 << d);
            match held.as_ref() {
                Some(v) => self.send_tagged(partner, v, tags::FOLD_DATA)?,
                None => held = Some(self.recv_from_as(partner).await?),
            }
        }

        self.barrier_any(tags::BROADCAST_BARRIER).await?;
        held.ok_or(NodeError::Protocol("broadcast completed without a value"))
    }

    /// Reduce to node 0, then broadcast the result: every node returns the
    /// full reduction.
    pub async fn reduce_all<T, F>(&self, value: T, f: F) -> Result<T, NodeError>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T, T) -> T,
    {
        let folded = self.reduce(0, value, f).await?;
        self.broadcast(0, folded).await
    }

    /// Gather at node 0, then broadcast the combined list to every node.
    pub async fn gather_all<T>(&self, items: Vec<T>) -> Result<Vec<T>, NodeError>
    where
        T: Serialize + DeserializeOwned,
    {
        let gathered = self.gather(0, items).await?;
        self.broadcast(0, gathered).await
    }
}
