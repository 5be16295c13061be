use std::sync::{mpsc::SyncSender, Arc};

use crossbeam_utils::sync::WaitGroup;
use log::debug;

use block_pool_store::BlockRequest;
use types::{containers::Block, primitives::PeerId};

pub enum ReconcilerMessage {
    Block {
        wait_group: WaitGroup,
        block: Arc<Block>,
        sender: PeerId,
    },
    Stop,
}

impl ReconcilerMessage {
    pub(crate) fn send(self, tx: &SyncSender<Self>) {
        // This can happen if the reconciler thread exits early due to
        // failure or if both `Controller` and `ReconcilerHandle` have
        // already stopped it.
        if tx.send(self).is_err() {
            debug!("send to reconciler failed because the receiver was dropped");
        }
    }
}

/// Outbound side of the gap-fill request queue.
///
/// The queue is bounded and a send blocks until the sync layer drains it. A
/// dropped request would leave a fork with a hole nothing ever fills, so
/// requests are never discarded under pressure.
pub struct RequestEmitter {
    request_tx: SyncSender<BlockRequest>,
}

impl RequestEmitter {
    pub(crate) fn new(request_tx: SyncSender<BlockRequest>) -> Self {
        Self { request_tx }
    }

    pub(crate) fn emit(&self, request: BlockRequest) {
        debug!(
            "requesting block {} from {}",
            request.block_hash, request.peer_id,
        );

        if self.request_tx.send(request).is_err() {
            debug!("block request dropped because the receiver was dropped");
        }
    }
}
