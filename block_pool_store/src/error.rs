use thiserror::Error;

use types::primitives::BlockHash;

/// Forest inconsistencies. These are logged at error level and answered
/// with "not mergeable"; the pool never panics over them, since the next
/// arrival may repair the state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("longest tail {tail_hash} is not in the tail set")]
    LongestTailMissing { tail_hash: BlockHash },
    #[error("fork walk from {tail_hash} escaped the forest at {parent_hash}")]
    WalkEscapedForest {
        tail_hash: BlockHash,
        parent_hash: BlockHash,
    },
    #[error("fork node {block_hash} was lost while assembling the chain")]
    NodeMissingDuringAssembly { block_hash: BlockHash },
}
