//! Driving code for the block pool store.
//!
//! This crate handles the following concerns:
//! - Serialising [`Store`] mutations in a single reconciler thread.
//! - Funnelling per-peer block deliveries into that thread.
//! - Emitting gap-fill requests for the sync layer to fulfil.
//! - Publishing store snapshots for queries.
//! - Testing.
//!
//! It exists primarily to separate [`block_pool_store`] from threading and
//! channels. [`block_pool_store`] should never depend on either.
//!
//! [`Store`]: block_pool_store::Store

pub use crate::{
    controller::{Controller, ReconcilerHandle},
    queries::ForkTip,
};

mod controller;
mod messages;
mod queries;
mod reconciler;

#[cfg(test)]
mod helpers;
