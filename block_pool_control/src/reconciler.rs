// `Reconciler::run` executes in a background thread and performs all
// mutations on a uniquely owned copy of `Store` as an alternative to
// locking. The forest, tail set and longest-tail mark share invariants that
// span all three, so anything finer-grained than a single writer would need
// one coarse lock held across every operation anyway.
//
// The store copy is only borrowed between channel operations: the outbound
// request send can block until the sync layer drains the queue, and nothing
// is held across it.

use std::sync::{mpsc::Receiver, Arc};

use anyhow::Result;
use arc_swap::ArcSwap;
use log::{debug, info, warn};

use block_pool_store::{BlockAction, Store};
use types::{containers::Block, primitives::PeerId, traits::Blockchain};

use crate::messages::{ReconcilerMessage, RequestEmitter};

pub struct Reconciler<C: Blockchain> {
    store: Store<C>,
    store_snapshot: Arc<ArcSwap<Store<C>>>,
    chain: Arc<C>,
    reconciler_rx: Receiver<ReconcilerMessage>,
    request_emitter: RequestEmitter,
}

impl<C: Blockchain> Reconciler<C> {
    pub(crate) fn new(
        store: Store<C>,
        store_snapshot: Arc<ArcSwap<Store<C>>>,
        chain: Arc<C>,
        reconciler_rx: Receiver<ReconcilerMessage>,
        request_emitter: RequestEmitter,
    ) -> Self {
        Self {
            store,
            store_snapshot,
            chain,
            reconciler_rx,
            request_emitter,
        }
    }

    pub(crate) fn run(&mut self) -> Result<()> {
        loop {
            match self
                .reconciler_rx
                .recv()
                .expect("sender in Controller is not dropped until reconciler thread exits")
            {
                ReconcilerMessage::Block {
                    wait_group,
                    block,
                    sender,
                } => {
                    self.handle_block(block, sender);
                    drop(wait_group);
                }
                ReconcilerMessage::Stop => break Ok(()),
            }
        }
    }

    fn handle_block(&mut self, block: Arc<Block>, sender: PeerId) {
        debug!(
            "received block {} at height {} from {sender}",
            block.hash(),
            block.height(),
        );

        match self.store.validate_block(&block) {
            BlockAction::Accept => {}
            // Already logged by the store; every anomaly is a local decision.
            BlockAction::Invalid | BlockAction::Duplicate => return,
        }

        let changes = self.store.apply_block(block, sender);

        if let Some(request) = changes.request() {
            self.request_emitter.emit(request);
        }

        if self.store.fork_can_merge() {
            self.merge_fork();
        }

        self.update_store_snapshot();
    }

    fn merge_fork(&mut self) {
        let blocks = self.store.build_fork_chain();

        let Some(tail) = blocks.first() else {
            return;
        };

        info!(
            "merging fork of {} blocks ending at {} into the main chain",
            blocks.len(),
            tail.hash(),
        );

        // Merge failures are the main chain's to handle; the pool's job ends
        // at handing over the chain.
        if let Err(error) = self.chain.merge_fork(blocks) {
            warn!("main chain failed to merge fork: {error:?}");
        }
    }

    fn update_store_snapshot(&self) {
        self.store_snapshot.store(Arc::new(self.store.clone()));
    }
}
