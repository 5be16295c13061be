use derive_more::Display;

pub use primitive_types::H256;

/// Double-SHA-256 of a block header.
pub type BlockHash = H256;

pub type Height = u64;

pub type UnixSeconds = u64;

/// Identifies the peer that delivered a block. Opaque to the pool; real
/// deployments wrap a transport identity here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display("peer{_0}")]
pub struct PeerId(pub u64);
