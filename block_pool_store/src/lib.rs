//! Reconciliation state for blocks that arrive ahead of the main chain.
//!
//! Blocks come in from peers out of order, with missing ancestors, along
//! several competing forks at once. We keep every block that is not yet on
//! the main chain in a *forest*: a map from block hash to fork node, with
//! parent edges by hash only. A node is `Ready` when the block itself is in
//! hand and `Expected` when some received block has named it as a parent
//! that is still missing. Expected nodes are what drive gap-fill requests.
//!
//! The leaves of the forest are *tails*, tracked separately in a bounded
//! LRU set. A dormant fork eventually has its tail pushed out by newer
//! arrivals, and the eviction triggers a cleanup walk that reclaims the
//! ancestors nothing else points through.
//!
//! A fork becomes interesting once its tallest tail strictly exceeds the
//! main chain's height and its ancestor chain is hole-free all the way back
//! into the main chain. At that point the ordered chain is cut out of the
//! forest and handed to the main chain's merge entrypoint.
//!
//! Parent edges go strictly toward decreasing height and always bottom out
//! in the main chain, so the forest is acyclic by construction. There are
//! deliberately no child back-pointers; the cleanup walk only ever goes
//! upward and keeps per-node child counts instead.
//!
//! [`Store`] is a single-writer structure. It is mutated by one
//! reconciler thread and cloned into snapshots for queries, which is why the
//! collections inside are persistent ones.

pub use crate::{
    error::Error,
    forest::Forest,
    misc::{ApplyBlockChanges, BlockAction, BlockRequest, ForkNode},
    store::Store,
    store_config::StoreConfig,
    tail_set::TailSet,
};

mod error;
mod forest;
mod misc;
mod store;
mod store_config;
mod tail_set;
