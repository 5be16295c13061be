use std::sync::Arc;

use anyhow::Result;

use crate::{
    containers::Block,
    primitives::{BlockHash, Height},
};

/// Block-level consensus checks (signatures, difficulty). External to the
/// pool; blocks that fail are dropped without touching the fork forest.
pub trait Consensus {
    fn verify_block(&self, block: &Block) -> bool;
}

/// The node's accepted chain. The pool only needs a presence test, the
/// current max height and the merge entrypoint; everything else the chain
/// does (storage, UTXO bookkeeping, reorgs) stays behind this trait.
pub trait Blockchain: Send + Sync + 'static {
    type Consensus: Consensus;

    fn contains(&self, hash: BlockHash) -> bool;

    fn max_height(&self) -> Height;

    /// Adopts a fork chain rooted in this chain. Blocks are ordered tail
    /// first (newest to oldest); implementations apply them oldest to
    /// newest, performing any transaction verification and reorg logic of
    /// their own.
    fn merge_fork(&self, blocks: Vec<Arc<Block>>) -> Result<()>;

    fn consensus(&self) -> &Self::Consensus;
}
