// Instead of mutating `Store` directly, `Controller::on_block` hands blocks
// to a reconciler thread that owns the only mutable copy. Query methods
// operate on a recent but potentially out-of-date snapshot of `Store`. This
// accomplishes two things:
// - Deliveries from any number of peer tasks are serialised without a lock
//   spanning the forest, tail set and longest-tail mark.
// - Query methods do not need to wait, so `on_block` callers and API
//   handlers never contend with reconciliation.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        mpsc::{Receiver, SyncSender},
        Arc, Mutex,
    },
    thread::{Builder, JoinHandle},
};

use anyhow::{Context as _, Result};
use arc_swap::{ArcSwap, Guard};
use crossbeam_utils::sync::WaitGroup;
use thiserror::Error;

use block_pool_store::{BlockRequest, Store, StoreConfig};
use types::{containers::Block, primitives::PeerId, traits::Blockchain};

use crate::{
    messages::{ReconcilerMessage, RequestEmitter},
    reconciler::Reconciler,
};

pub struct Controller<C: Blockchain> {
    // The latest consistent snapshot of the store.
    store_snapshot: Arc<ArcSwap<Store<C>>>,
    wait_group: Mutex<WaitGroup>,
    reconciler_tx: SyncSender<ReconcilerMessage>,
}

impl<C: Blockchain> Drop for Controller<C> {
    fn drop(&mut self) {
        ReconcilerMessage::Stop.send(&self.reconciler_tx);
    }
}

impl<C: Blockchain> Controller<C> {
    /// Wires the pool to its main chain and starts the reconciler thread.
    ///
    /// `size` is the capacity of both the inbound block queue and the
    /// outbound request queue. The returned [`Receiver`] is the read handle
    /// the sync layer drains gap-fill requests from.
    pub fn new(
        chain: Arc<C>,
        store_config: StoreConfig,
        size: usize,
    ) -> Result<(Arc<Self>, ReconcilerHandle, Receiver<BlockRequest>)> {
        let store = Store::new(chain.clone(), store_config);
        let store_snapshot = Arc::new(ArcSwap::from_pointee(store.clone()));

        let (reconciler_tx, reconciler_rx) = std::sync::mpsc::sync_channel(size);
        let (request_tx, request_rx) = std::sync::mpsc::sync_channel(size);

        let mut reconciler = Reconciler::new(
            store,
            store_snapshot.clone(),
            chain,
            reconciler_rx,
            RequestEmitter::new(request_tx),
        );

        let join_handle = Builder::new()
            .name("block-pool-reconciler".to_owned())
            .spawn(|| {
                // The closure should be unwind safe. The copy of `Store`
                // owned by the reconciler may become inconsistent on a panic
                // but cannot be observed, because the shared snapshot is
                // only updated with values that are consistent.
                match std::panic::catch_unwind(AssertUnwindSafe(move || reconciler.run())) {
                    Ok(result) => result.context(Error::ReconcilerFailed),
                    Err(_payload) => Err(Error::ReconcilerPanicked.into()),
                }
            })?;

        let controller = Arc::new(Self {
            store_snapshot,
            wait_group: Mutex::new(WaitGroup::new()),
            reconciler_tx: reconciler_tx.clone(),
        });

        let reconciler_handle = ReconcilerHandle {
            join_handle: Some(join_handle),
            reconciler_tx,
        };

        Ok((controller, reconciler_handle, request_rx))
    }

    /// Hands a received block to the reconciler. The sole ingress.
    ///
    /// Blocks delivered by one peer are processed in delivery order. The
    /// call blocks while the inbound queue is full; no cross-peer ordering
    /// is promised.
    pub fn on_block(&self, block: Arc<Block>, sender: PeerId) {
        ReconcilerMessage::Block {
            wait_group: self.owned_wait_group(),
            block,
            sender,
        }
        .send(&self.reconciler_tx);
    }

    /// Waits until every block handed over so far has been reconciled.
    ///
    /// This is intended for use in tests and benchmarks.
    pub fn wait_for_blocks(&self) {
        let wait_group = core::mem::take(
            &mut *self
                .wait_group
                .lock()
                .expect("Controller.wait_group mutex is poisoned"),
        );

        wait_group.wait();
    }

    pub(crate) fn store_snapshot(&self) -> Guard<Arc<Store<C>>> {
        self.store_snapshot.load()
    }

    fn owned_wait_group(&self) -> WaitGroup {
        self.wait_group
            .lock()
            .expect("Controller.wait_group mutex is poisoned")
            .clone()
    }
}

/// A wrapper over [`JoinHandle`] that can be used to wait for the reconciler
/// thread to finish.
///
/// In normal operation the reconciler thread should be joined explicitly
/// using [`ReconcilerHandle::join`]. Tests may drop [`ReconcilerHandle`], at
/// which point the thread is stopped and joined implicitly.
pub struct ReconcilerHandle {
    join_handle: Option<JoinHandle<Result<()>>>,
    reconciler_tx: SyncSender<ReconcilerMessage>,
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        // Stop the reconciler thread to avoid a deadlock if the
        // corresponding `Controller` hasn't been dropped yet.
        self.stop();

        let result = self.join_internal();

        if !std::thread::panicking() {
            result.expect("reconciler thread should succeed when joined implicitly");
        }
    }
}

impl ReconcilerHandle {
    pub fn join(mut self) -> Result<()> {
        self.join_internal()
    }

    fn stop(&self) {
        ReconcilerMessage::Stop.send(&self.reconciler_tx);
    }

    fn join_internal(&mut self) -> Result<()> {
        // Don't use `Option::expect` here.
        // `ReconcilerHandle::join_internal` is called twice in normal operation.
        match self.join_handle.take() {
            Some(join_handle) => join_handle
                .join()
                .expect("reconciler thread handles panics internally"),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
enum Error {
    #[error("reconciler panicked")]
    ReconcilerPanicked,
    #[error("reconciler failed")]
    ReconcilerFailed,
}
