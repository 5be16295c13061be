use std::sync::Arc;

use im::HashMap;

use types::{containers::Block, primitives::BlockHash};

use crate::misc::ForkNode;

/// The fork forest: every block the pool holds or expects, keyed by hash.
/// Parent edges are hashes, not references, so the structure cannot form
/// cycles; they bottom out in the main chain.
#[derive(Clone, Default)]
pub struct Forest {
    nodes: HashMap<BlockHash, ForkNode>,
}

impl Forest {
    /// Inserts a received block. A node already present transitions to
    /// `Ready` keeping its child count; re-inserting a `Ready` node is a
    /// no-op in effect, which makes redelivery harmless.
    pub fn insert_ready(&mut self, block: Arc<Block>) {
        let hash = block.hash();
        let children = self.nodes.get(&hash).map_or(0, ForkNode::children);

        self.nodes.insert(hash, ForkNode::Ready { block, children });
    }

    /// Records that a received block cited `hash` as its parent. Creates an
    /// `Expected` node with one citation or adds a citation to whatever node
    /// is already there.
    pub fn insert_expected(&mut self, hash: BlockHash) {
        match self.nodes.get_mut(&hash) {
            Some(node) => *node.children_mut() += 1,
            None => {
                self.nodes.insert(hash, ForkNode::Expected { children: 1 });
            }
        }
    }

    pub fn increment_children(&mut self, hash: &BlockHash) {
        if let Some(node) = self.nodes.get_mut(hash) {
            *node.children_mut() += 1;
        }
    }

    /// Drops a citation and returns the updated node so the caller can
    /// re-check its removal conditions.
    pub fn decrement_children(&mut self, hash: &BlockHash) -> Option<ForkNode> {
        let node = self.nodes.get_mut(hash)?;
        let children = node.children_mut();
        *children = children.saturating_sub(1);

        Some(node.clone())
    }

    #[must_use]
    pub fn get(&self, hash: &BlockHash) -> Option<&ForkNode> {
        self.nodes.get(hash)
    }

    #[must_use]
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn remove(&mut self, hash: &BlockHash) -> Option<ForkNode> {
        self.nodes.remove(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockHash, &ForkNode)> {
        self.nodes.iter()
    }
}
