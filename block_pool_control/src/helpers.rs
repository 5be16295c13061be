use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, TryRecvError},
        Arc, Mutex,
    },
};

use anyhow::Result;

use block_pool_store::{BlockRequest, StoreConfig};
use types::{
    containers::{transactions_root, Block, BlockHeader},
    primitives::{BlockHash, Height, PeerId, H256},
    traits::{Blockchain, Consensus},
};

use crate::controller::{Controller, ReconcilerHandle};

pub const PEER: PeerId = PeerId(1);

const CHANNEL_SIZE: usize = 16;

pub struct Context {
    controller: Option<Arc<Controller<TestChain>>>,
    #[expect(
        dead_code,
        reason = "Keep the `ReconcilerHandle` around to avoid joining the reconciler thread prematurely."
    )]
    reconciler_handle: ReconcilerHandle,
    chain: Arc<TestChain>,
    request_rx: Receiver<BlockRequest>,
}

impl Drop for Context {
    fn drop(&mut self) {
        let controller = self
            .controller
            .take()
            .expect("Context.controller is only taken in Drop::drop");

        if !std::thread::panicking() {
            controller.wait_for_blocks();
            drop(controller);

            assert_eq!(
                self.next_request(),
                None,
                "unconsumed block requests left in the queue",
            );
        }
    }
}

impl Context {
    pub fn new(tip_hash: BlockHash, tip_height: Height) -> Self {
        Self::with_store_config(StoreConfig::default(), tip_hash, tip_height)
    }

    pub fn with_store_config(
        store_config: StoreConfig,
        tip_hash: BlockHash,
        tip_height: Height,
    ) -> Self {
        let chain = Arc::new(TestChain::with_tip(tip_hash, tip_height));

        let (controller, reconciler_handle, request_rx) =
            Controller::new(chain.clone(), store_config, CHANNEL_SIZE)
                .expect("Controller::new should not fail in tests");

        Self {
            controller: Some(controller),
            reconciler_handle,
            chain,
            request_rx,
        }
    }

    pub fn controller(&self) -> &Controller<TestChain> {
        self.controller
            .as_ref()
            .expect("Context.controller is only taken in Drop::drop")
    }

    pub fn chain(&self) -> &TestChain {
        &self.chain
    }

    pub fn push(&self, block: &Arc<Block>) {
        self.push_from(block, PEER);
    }

    pub fn push_from(&self, block: &Arc<Block>, sender: PeerId) {
        self.controller().on_block(block.clone(), sender);
        self.controller().wait_for_blocks();
    }

    pub fn next_request(&self) -> Option<BlockRequest> {
        match self.request_rx.try_recv() {
            Ok(request) => Some(request),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn expect_request(&self, block_hash: BlockHash, peer_id: PeerId) {
        assert_eq!(
            self.next_request(),
            Some(BlockRequest {
                block_hash,
                peer_id,
            }),
        );
    }

    pub fn assert_status(&self, expected: Status) {
        let actual = Status {
            fork_block_count: self.controller().fork_block_count(),
            tail_count: self.controller().tail_count(),
            longest_tail: self.controller().longest_tail_hash(),
            merged_chain_count: self.chain.merged_chains().len(),
        };

        assert_eq!(actual, expected);
    }

    pub fn assert_invariants(&self) {
        let nodes = self.controller().fork_nodes();
        let tips = self.controller().fork_tips();

        // A tail has no pooled child.
        for tip in &tips {
            let has_ready_child = nodes.iter().any(|(_, node)| {
                node.block()
                    .is_some_and(|block| block.parent_hash() == tip.hash)
            });

            assert!(!has_ready_child, "tail {} still has a pooled child", tip.hash);
        }

        // An expected node's citation count matches its held children.
        for (hash, node) in &nodes {
            if node.is_expected() {
                let citations = nodes
                    .iter()
                    .filter(|(_, other)| {
                        other
                            .block()
                            .is_some_and(|block| block.parent_hash() == *hash)
                    })
                    .count();

                assert_eq!(
                    node.children() as usize, citations,
                    "stale citation count for expected node {hash}",
                );
            }
        }

        // The longest-tail mark names the tallest tail.
        if let Some(longest) = self.controller().longest_tail() {
            let tallest = tips.iter().map(|tip| tip.height).max();

            assert_eq!(
                Some(longest.height),
                tallest,
                "longest tail {} is not the tallest",
                longest.hash,
            );
        } else {
            assert_eq!(self.controller().longest_tail_hash(), None);
        }
    }
}

#[derive(PartialEq, Eq, Debug)]
pub struct Status {
    pub fork_block_count: usize,
    pub tail_count: usize,
    pub longest_tail: Option<BlockHash>,
    pub merged_chain_count: usize,
}

/// An in-memory stand-in for the main chain. Records every merged fork and
/// adopts it, so follow-up pushes see the new blocks and height.
pub struct TestChain {
    consensus: TestConsensus,
    inner: Mutex<ChainInner>,
}

struct ChainInner {
    blocks: HashSet<BlockHash>,
    max_height: Height,
    merged: Vec<Vec<Arc<Block>>>,
}

impl Blockchain for TestChain {
    type Consensus = TestConsensus;

    fn contains(&self, hash: BlockHash) -> bool {
        self.lock().blocks.contains(&hash)
    }

    fn max_height(&self) -> Height {
        self.lock().max_height
    }

    fn merge_fork(&self, blocks: Vec<Arc<Block>>) -> Result<()> {
        let mut inner = self.lock();

        for block in blocks.iter().rev() {
            inner.blocks.insert(block.hash());
            inner.max_height = inner.max_height.max(block.height());
        }

        inner.merged.push(blocks);

        Ok(())
    }

    fn consensus(&self) -> &TestConsensus {
        &self.consensus
    }
}

impl TestChain {
    pub fn with_tip(tip_hash: BlockHash, tip_height: Height) -> Self {
        Self {
            consensus: TestConsensus {
                reject: AtomicBool::new(false),
            },
            inner: Mutex::new(ChainInner {
                blocks: HashSet::from([tip_hash]),
                max_height: tip_height,
                merged: vec![],
            }),
        }
    }

    pub fn merged_chains(&self) -> Vec<Vec<Arc<Block>>> {
        self.lock().merged.clone()
    }

    pub fn reject_blocks(&self) {
        self.consensus.reject.store(true, Ordering::Relaxed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainInner> {
        self.inner
            .lock()
            .expect("TestChain.inner mutex is poisoned")
    }
}

pub struct TestConsensus {
    reject: AtomicBool,
}

impl Consensus for TestConsensus {
    fn verify_block(&self, _block: &Block) -> bool {
        !self.reject.load(Ordering::Relaxed)
    }
}

pub fn hash(byte: u8) -> BlockHash {
    H256::repeat_byte(byte)
}

pub fn block(parent_hash: BlockHash, height: Height, nonce: u64) -> Arc<Block> {
    Arc::new(Block::new(
        BlockHeader {
            parent_hash,
            height,
            timestamp: 1_600_000_000 + height,
            transactions_root: transactions_root(&[]),
            nonce,
        },
        vec![],
    ))
}

pub fn child_of(parent: &Block, nonce: u64) -> Arc<Block> {
    block(parent.hash(), parent.height() + 1, nonce)
}
