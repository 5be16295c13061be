use std::sync::Arc;

use log::{debug, error};

use types::{
    containers::Block,
    primitives::{BlockHash, Height, PeerId},
    traits::{Blockchain, Consensus as _},
};

use crate::{
    error::Error,
    forest::Forest,
    misc::{ApplyBlockChanges, BlockAction, BlockRequest, ForkNode},
    store_config::StoreConfig,
    tail_set::TailSet,
};

/// Single-writer reconciliation state: the fork forest, the tail set and the
/// longest-tail mark. One reconciler thread mutates it; queries run on
/// cloned snapshots.
///
/// Block processing is split into [`Store::validate_block`], which does not
/// mutate the store, and [`Store::apply_block`], which does. Channel sends
/// never happen in here; `apply_block` hands any missing-parent request back
/// to the caller.
pub struct Store<C: Blockchain> {
    chain: Arc<C>,
    store_config: StoreConfig,
    forest: Forest,
    tails: TailSet,
    // Hash of the tallest tail, if any. An eviction can leave it pointing at
    // nothing; `note_new_tail` re-scans when that happens, and
    // `fork_can_merge` treats an unresolvable mark as a logged error.
    longest_tail: Option<BlockHash>,
}

// Not derived because that would require `C: Clone`.
impl<C: Blockchain> Clone for Store<C> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            store_config: self.store_config,
            forest: self.forest.clone(),
            tails: self.tails.clone(),
            longest_tail: self.longest_tail,
        }
    }
}

impl<C: Blockchain> Store<C> {
    #[must_use]
    pub fn new(chain: Arc<C>, store_config: StoreConfig) -> Self {
        Self {
            chain,
            store_config,
            forest: Forest::default(),
            tails: TailSet::new(store_config.fork_chain_limit),
            longest_tail: None,
        }
    }

    #[must_use]
    pub const fn store_config(&self) -> StoreConfig {
        self.store_config
    }

    /// Decides what to do with a received block without touching the store.
    #[must_use]
    pub fn validate_block(&self, block: &Block) -> BlockAction {
        let block_hash = block.hash();

        if !block.verify_hash() {
            debug!("block {block_hash} failed hash verification");
            return BlockAction::Invalid;
        }

        if !self.chain.consensus().verify_block(block) {
            debug!("block {block_hash} failed consensus verification");
            return BlockAction::Invalid;
        }

        if self.chain.contains(block_hash) {
            debug!("block {block_hash} is already on the main chain");
            return BlockAction::Duplicate;
        }

        if self.forest.get(&block_hash).is_some_and(ForkNode::is_ready) {
            debug!("block {block_hash} is already pooled");
            return BlockAction::Duplicate;
        }

        BlockAction::Accept
    }

    /// Places an accepted block into the forest and tail set and reports the
    /// missing-parent request, if any, for the caller to emit.
    pub fn apply_block(&mut self, block: Arc<Block>, sender: PeerId) -> ApplyBlockChanges {
        let block_hash = block.hash();
        let parent_hash = block.parent_hash();
        let height = block.height();

        // The parent stops being a tail once this block extends it. Plain
        // removal; extension is not eviction, so no cleanup walk runs.
        let extended = self.tails.remove(&parent_hash).is_some();

        if self.forest.get(&block_hash).is_some_and(ForkNode::is_expected) {
            // The block fills a gap a descendant has already requested. Its
            // citations stay as they are and it does not become a tail.
            self.forest.insert_ready(block);
            let request = self.check_and_request_parent(parent_hash, sender);
            self.repair_longest_tail();

            return ApplyBlockChanges::FilledGap { request };
        }

        self.forest.insert_ready(block.clone());

        if let Some((evicted_hash, _)) = self.tails.add(block_hash, block) {
            debug!("tail {evicted_hash} evicted under pressure; reclaiming its branch");
            self.cascade_cleanup(evicted_hash);
        }

        self.note_new_tail(block_hash, height);

        let request = self.check_and_request_parent(parent_hash, sender);

        if extended {
            ApplyBlockChanges::ExtendedTail { request }
        } else {
            ApplyBlockChanges::StartedTail { request }
        }
    }

    /// Accounts for a block's parent: nothing to do if the main chain has
    /// it, one more citation if the forest has it, and otherwise an
    /// `Expected` placeholder plus a request to the delivering peer.
    fn check_and_request_parent(
        &mut self,
        parent_hash: BlockHash,
        sender: PeerId,
    ) -> Option<BlockRequest> {
        if self.chain.contains(parent_hash) {
            return None;
        }

        if self.forest.contains(&parent_hash) {
            self.forest.increment_children(&parent_hash);
            return None;
        }

        self.forest.insert_expected(parent_hash);

        Some(BlockRequest {
            block_hash: parent_hash,
            peer_id: sender,
        })
    }

    /// True iff the longest tail's chain is hole-free back into the main
    /// chain and strictly taller than it. The pool never displaces a main
    /// chain of equal or greater height.
    #[must_use]
    pub fn fork_can_merge(&self) -> bool {
        let Some(tail_hash) = self.longest_tail else {
            return false;
        };

        let Some(tail_block) = self.tails.get(&tail_hash) else {
            error!("{}", Error::LongestTailMissing { tail_hash });
            return false;
        };

        if tail_block.height() <= self.chain.max_height() {
            debug!("fork tail {tail_hash} is not ahead of the main chain");
            return false;
        }

        let mut parent_hash = tail_block.parent_hash();

        loop {
            if self.chain.contains(parent_hash) {
                return true;
            }

            match self.forest.get(&parent_hash) {
                Some(ForkNode::Ready { block, .. }) => parent_hash = block.parent_hash(),
                // The chain still has a hole.
                Some(ForkNode::Expected { .. }) => return false,
                None => {
                    error!(
                        "{}",
                        Error::WalkEscapedForest {
                            tail_hash,
                            parent_hash,
                        },
                    );
                    return false;
                }
            }
        }
    }

    /// Cuts the longest tail's chain out of the forest, tail to root.
    ///
    /// Callers must check [`Store::fork_can_merge`] first. Each visited node
    /// is removed after it is appended to the output; the walk stops before
    /// removal once the next parent lies on the main chain.
    pub fn build_fork_chain(&mut self) -> Vec<Arc<Block>> {
        let Some(tail_hash) = self.longest_tail else {
            return vec![];
        };

        let Some(mut block) = self.tails.get(&tail_hash).cloned() else {
            error!("{}", Error::LongestTailMissing { tail_hash });
            return vec![];
        };

        let mut blocks = vec![];

        loop {
            let block_hash = block.hash();
            let parent_hash = block.parent_hash();

            blocks.push(block);
            self.forest.remove(&block_hash);

            if self.chain.contains(parent_hash) {
                break;
            }

            match self.forest.get(&parent_hash).and_then(ForkNode::block) {
                Some(parent_block) => block = parent_block.clone(),
                None => {
                    error!(
                        "{}",
                        Error::NodeMissingDuringAssembly {
                            block_hash: parent_hash,
                        },
                    );
                    break;
                }
            }
        }

        // The consumed tail leaves the set through plain removal; the next
        // longest is picked from what remains.
        self.tails.remove(&tail_hash);
        self.longest_tail = None;
        self.refresh_longest_tail();

        blocks
    }

    /// Reclaims the branch under an evicted tail: walking upward, a node is
    /// dropped once nothing points through it any more. An `Expected` node
    /// reached by the walk is always dropped; the gap is abandoned, and
    /// having no block it has no recorded parent to continue to.
    fn cascade_cleanup(&mut self, evicted_tail_hash: BlockHash) {
        let mut hash = evicted_tail_hash;

        loop {
            let Some(node) = self.forest.decrement_children(&hash) else {
                return;
            };

            match node {
                ForkNode::Expected { .. } => {
                    self.forest.remove(&hash);
                    debug!("abandoned missing ancestor {hash}");
                    return;
                }
                ForkNode::Ready { block, children: 0 } => {
                    self.forest.remove(&hash);
                    debug!("dropped orphaned fork block {hash}");
                    hash = block.parent_hash();
                }
                // Some other fork still needs this ancestor.
                ForkNode::Ready { .. } => return,
            }
        }
    }

    /// Marks a freshly added tail as the longest if it is the tallest so
    /// far. Re-scans first when the marked tail is gone.
    fn note_new_tail(&mut self, tail_hash: BlockHash, height: Height) {
        self.repair_longest_tail();

        let longest_height = self
            .longest_tail
            .and_then(|hash| self.tails.get(&hash))
            .map(|block| block.height());

        match longest_height {
            Some(longest_height) if height <= longest_height => {}
            _ => self.longest_tail = Some(tail_hash),
        }
    }

    /// Re-scans when a removal or eviction has taken the marked tail away.
    fn repair_longest_tail(&mut self) {
        if self
            .longest_tail
            .is_some_and(|hash| !self.tails.contains(&hash))
        {
            self.refresh_longest_tail();
        }
    }

    /// Scans the tail set for the tallest tail. Scanned least recently used
    /// first, so height ties go to the most recent one.
    fn refresh_longest_tail(&mut self) {
        let mut longest: Option<(BlockHash, Height)> = None;

        for (hash, block) in self.tails.iter() {
            if longest.map_or(true, |(_, height)| block.height() >= height) {
                longest = Some((*hash, block.height()));
            }
        }

        self.longest_tail = longest.map(|(hash, _)| hash);
    }

    #[must_use]
    pub fn fork_block_count(&self) -> usize {
        self.forest.len()
    }

    #[must_use]
    pub fn contains_fork_block(&self, hash: &BlockHash) -> bool {
        self.forest.contains(hash)
    }

    #[must_use]
    pub fn fork_node(&self, hash: &BlockHash) -> Option<&ForkNode> {
        self.forest.get(hash)
    }

    pub fn fork_nodes(&self) -> impl Iterator<Item = (&BlockHash, &ForkNode)> {
        self.forest.iter()
    }

    #[must_use]
    pub fn tail_count(&self) -> usize {
        self.tails.len()
    }

    #[must_use]
    pub fn is_tail(&self, hash: &BlockHash) -> bool {
        self.tails.contains(hash)
    }

    #[must_use]
    pub fn tail_block(&self, hash: &BlockHash) -> Option<&Arc<Block>> {
        self.tails.get(hash)
    }

    /// Tails with their blocks, least recently used first.
    pub fn tail_blocks(&self) -> impl Iterator<Item = (&BlockHash, &Arc<Block>)> {
        self.tails.iter()
    }

    #[must_use]
    pub const fn longest_tail_hash(&self) -> Option<BlockHash> {
        self.longest_tail
    }

    #[must_use]
    pub fn longest_tail_block(&self) -> Option<&Arc<Block>> {
        self.longest_tail
            .as_ref()
            .and_then(|hash| self.tails.get(hash))
    }
}
