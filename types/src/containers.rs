use sha2::{Digest as _, Sha256};

use crate::primitives::{BlockHash, Height, UnixSeconds, H256};

/// A transaction carried in a block body. The pool never looks inside;
/// verifying transactions against the UTXO index is the main chain's job.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    pub id: H256,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockHeader {
    pub parent_hash: BlockHash,
    pub height: Height,
    pub timestamp: UnixSeconds,
    pub transactions_root: H256,
    pub nonce: u64,
}

impl BlockHeader {
    #[must_use]
    pub fn compute_hash(&self) -> BlockHash {
        let mut bytes = Vec::with_capacity(88);
        bytes.extend_from_slice(self.parent_hash.as_bytes());
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(self.transactions_root.as_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        sha256d(&bytes)
    }
}

/// A block as received from a peer. Immutable; the hash it was delivered
/// under is kept alongside the header so that [`Block::verify_hash`] can
/// recompute and compare.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    hash: BlockHash,
}

impl Block {
    #[must_use]
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let hash = header.compute_hash();

        Self {
            header,
            transactions,
            hash,
        }
    }

    /// Reassembles a block exactly as it came off the wire, keeping the
    /// claimed hash even when it does not match the contents.
    #[must_use]
    pub fn from_parts(
        header: BlockHeader,
        transactions: Vec<Transaction>,
        hash: BlockHash,
    ) -> Self {
        Self {
            header,
            transactions,
            hash,
        }
    }

    #[must_use]
    pub const fn hash(&self) -> BlockHash {
        self.hash
    }

    #[must_use]
    pub const fn parent_hash(&self) -> BlockHash {
        self.header.parent_hash
    }

    #[must_use]
    pub const fn height(&self) -> Height {
        self.header.height
    }

    #[must_use]
    pub const fn header(&self) -> &BlockHeader {
        &self.header
    }

    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// True iff the hash the block was delivered under matches its contents.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        self.header.compute_hash() == self.hash
    }
}

#[must_use]
pub fn transactions_root(transactions: &[Transaction]) -> H256 {
    let mut bytes = Vec::with_capacity(transactions.len() * 32);

    for transaction in transactions {
        bytes.extend_from_slice(transaction.id.as_bytes());
    }

    sha256d(&bytes)
}

fn sha256d(data: &[u8]) -> H256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    H256::from_slice(&second)
}
