use std::sync::Arc;

use block_pool_store::{ForkNode, StoreConfig};
use types::{
    containers::Block,
    primitives::{BlockHash, Height},
    traits::Blockchain,
};

use crate::controller::Controller;

/// A fork tail visible in a store snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ForkTip {
    pub hash: BlockHash,
    pub height: Height,
}

// These methods run on the latest published snapshot, which may lag behind
// the reconciler by the blocks still in its queue.
impl<C: Blockchain> Controller<C> {
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        self.store_snapshot().store_config()
    }

    #[must_use]
    pub fn fork_block_count(&self) -> usize {
        self.store_snapshot().fork_block_count()
    }

    #[must_use]
    pub fn contains_fork_block(&self, hash: BlockHash) -> bool {
        self.store_snapshot().contains_fork_block(&hash)
    }

    #[must_use]
    pub fn fork_node(&self, hash: BlockHash) -> Option<ForkNode> {
        self.store_snapshot().fork_node(&hash).cloned()
    }

    #[must_use]
    pub fn fork_nodes(&self) -> Vec<(BlockHash, ForkNode)> {
        self.store_snapshot()
            .fork_nodes()
            .map(|(hash, node)| (*hash, node.clone()))
            .collect()
    }

    #[must_use]
    pub fn tail_count(&self) -> usize {
        self.store_snapshot().tail_count()
    }

    #[must_use]
    pub fn is_tail(&self, hash: BlockHash) -> bool {
        self.store_snapshot().is_tail(&hash)
    }

    #[must_use]
    pub fn tail_block(&self, hash: BlockHash) -> Option<Arc<Block>> {
        self.store_snapshot().tail_block(&hash).cloned()
    }

    /// Tails with their heights, least recently used first.
    #[must_use]
    pub fn fork_tips(&self) -> Vec<ForkTip> {
        self.store_snapshot()
            .tail_blocks()
            .map(|(hash, block)| ForkTip {
                hash: *hash,
                height: block.height(),
            })
            .collect()
    }

    #[must_use]
    pub fn longest_tail_hash(&self) -> Option<BlockHash> {
        self.store_snapshot().longest_tail_hash()
    }

    #[must_use]
    pub fn longest_tail(&self) -> Option<ForkTip> {
        let snapshot = self.store_snapshot();

        snapshot.longest_tail_block().map(|block| ForkTip {
            hash: block.hash(),
            height: block.height(),
        })
    }
}
