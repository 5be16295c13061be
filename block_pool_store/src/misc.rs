use std::sync::Arc;

use types::{
    containers::Block,
    primitives::{BlockHash, PeerId},
};

/// A node in the fork forest.
///
/// `Ready` holds the received block. `Expected` stands in for a parent hash
/// that some received block has cited but that has not arrived yet. In both
/// states `children` counts the forest nodes naming this one as their
/// parent; it is what keeps shared ancestors alive during cleanup.
#[derive(Clone, Debug)]
pub enum ForkNode {
    Ready { block: Arc<Block>, children: u32 },
    Expected { children: u32 },
}

impl ForkNode {
    #[must_use]
    pub const fn children(&self) -> u32 {
        match self {
            Self::Ready { children, .. } | Self::Expected { children } => *children,
        }
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::Expected { .. })
    }

    #[must_use]
    pub const fn block(&self) -> Option<&Arc<Block>> {
        match self {
            Self::Ready { block, .. } => Some(block),
            Self::Expected { .. } => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut u32 {
        match self {
            Self::Ready { children, .. } | Self::Expected { children } => children,
        }
    }
}

/// What the reconciler should do with a received block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockAction {
    /// New to the pool; insert it into the forest.
    Accept,
    /// Failed hash or consensus verification. Dropped without touching the
    /// forest and without requesting its parent.
    Invalid,
    /// Already on the main chain or already held `Ready`. Dropped.
    Duplicate,
}

/// A gap-fill request for a block that is in neither the forest nor the
/// main chain, addressed to the peer whose block cited it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockRequest {
    pub block_hash: BlockHash,
    pub peer_id: PeerId,
}

/// How [`Store::apply_block`] placed a block, along with the at-most-one
/// missing-parent request the caller must put on the outbound queue. The
/// store itself never touches channels.
///
/// [`Store::apply_block`]: crate::Store::apply_block
#[derive(Debug)]
pub enum ApplyBlockChanges {
    /// The block filled a previously requested gap (`Expected` → `Ready`).
    FilledGap { request: Option<BlockRequest> },
    /// The block replaced its parent as the tail of an existing fork.
    ExtendedTail { request: Option<BlockRequest> },
    /// The block started a new tail.
    StartedTail { request: Option<BlockRequest> },
}

impl ApplyBlockChanges {
    #[must_use]
    pub const fn request(&self) -> Option<BlockRequest> {
        match self {
            Self::FilledGap { request }
            | Self::ExtendedTail { request }
            | Self::StartedTail { request } => *request,
        }
    }
}
