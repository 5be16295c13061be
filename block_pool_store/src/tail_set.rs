use std::sync::Arc;

use im::{HashMap, OrdMap};

use types::{containers::Block, primitives::BlockHash};

/// The fork tails (leaves of the forest), bounded with least-recently-used
/// eviction.
///
/// Overflow eviction is reported through the return value of
/// [`TailSet::add`]; [`TailSet::remove`] never has eviction side effects.
/// Keeping the two apart is what lets a tail leave the set quietly when a
/// child extends it or a merge consumes it, while LRU pressure on dormant
/// forks still triggers cleanup in the caller.
///
/// Built over persistent maps with a monotonic recency stamp so the whole
/// store stays cheap to clone for snapshots. Only (re-)insertion refreshes
/// recency; lookups do not.
#[derive(Clone)]
pub struct TailSet {
    entries: HashMap<BlockHash, TailEntry>,
    recency: OrdMap<u64, BlockHash>,
    capacity: usize,
    next_stamp: u64,
}

#[derive(Clone)]
struct TailEntry {
    block: Arc<Block>,
    stamp: u64,
}

impl TailSet {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "tail set capacity must be nonzero");

        Self {
            entries: HashMap::new(),
            recency: OrdMap::new(),
            capacity,
            next_stamp: 0,
        }
    }

    /// Inserts a tail, refreshing its recency if it is already present, and
    /// returns the least recently used tail if the insertion overflowed the
    /// capacity.
    pub fn add(&mut self, hash: BlockHash, block: Arc<Block>) -> Option<(BlockHash, Arc<Block>)> {
        if let Some(entry) = self.entries.remove(&hash) {
            self.recency.remove(&entry.stamp);
        }

        let stamp = self.next_stamp;
        self.next_stamp += 1;

        self.entries.insert(hash, TailEntry { block, stamp });
        self.recency.insert(stamp, hash);

        if self.entries.len() <= self.capacity {
            return None;
        }

        let (oldest_stamp, oldest_hash) = self.recency.get_min().copied()?;
        self.recency.remove(&oldest_stamp);
        let entry = self.entries.remove(&oldest_hash)?;

        Some((oldest_hash, entry.block))
    }

    /// Removes a tail without eviction side effects.
    pub fn remove(&mut self, hash: &BlockHash) -> Option<Arc<Block>> {
        let entry = self.entries.remove(hash)?;
        self.recency.remove(&entry.stamp);

        Some(entry.block)
    }

    #[must_use]
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.entries.contains_key(hash)
    }

    #[must_use]
    pub fn get(&self, hash: &BlockHash) -> Option<&Arc<Block>> {
        self.entries.get(hash).map(|entry| &entry.block)
    }

    /// Tail hashes, least recently used first.
    pub fn keys(&self) -> impl Iterator<Item = &BlockHash> {
        self.recency.values()
    }

    /// Tails with their blocks, least recently used first.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockHash, &Arc<Block>)> {
        self.recency.iter().filter_map(move |(_, hash)| {
            self.entries.get(hash).map(|entry| (hash, &entry.block))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::containers::{transactions_root, BlockHeader};
    use types::primitives::H256;

    use super::*;

    fn block(height: u64) -> Arc<Block> {
        Arc::new(Block::new(
            BlockHeader {
                parent_hash: H256::zero(),
                height,
                timestamp: 1_600_000_000,
                transactions_root: transactions_root(&[]),
                nonce: height,
            },
            vec![],
        ))
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(10)]
    fn eviction_begins_only_past_capacity(capacity: usize) {
        let mut tails = TailSet::new(capacity);

        for index in 0..capacity {
            let hash = H256::repeat_byte(index as u8 + 1);
            assert_eq!(tails.add(hash, block(index as u64)), None);
        }

        let overflow = tails.add(H256::repeat_byte(0xff), block(99));

        assert_eq!(
            overflow.map(|(hash, _)| hash),
            Some(H256::repeat_byte(1)),
            "the least recently used tail should be evicted",
        );
        assert_eq!(tails.len(), capacity);
    }

    #[test]
    fn re_adding_refreshes_recency() {
        let mut tails = TailSet::new(2);
        let first = H256::repeat_byte(1);
        let second = H256::repeat_byte(2);

        tails.add(first, block(1));
        tails.add(second, block(2));
        tails.add(first, block(1));

        let evicted = tails.add(H256::repeat_byte(3), block(3));

        assert_eq!(evicted.map(|(hash, _)| hash), Some(second));
        assert!(tails.contains(&first));
    }

    #[test]
    fn remove_is_silent_and_makes_room() {
        let mut tails = TailSet::new(1);
        let first = H256::repeat_byte(1);

        tails.add(first, block(1));
        assert!(tails.remove(&first).is_some());
        assert!(tails.remove(&first).is_none());

        assert_eq!(tails.add(H256::repeat_byte(2), block(2)), None);
    }

    #[test]
    fn keys_iterate_least_recently_used_first() {
        let mut tails = TailSet::new(3);
        let hashes = [
            H256::repeat_byte(1),
            H256::repeat_byte(2),
            H256::repeat_byte(3),
        ];

        for (index, hash) in hashes.iter().enumerate() {
            tails.add(*hash, block(index as u64));
        }

        tails.add(hashes[0], block(0));

        assert_eq!(
            tails.keys().copied().collect::<Vec<_>>(),
            vec![hashes[1], hashes[2], hashes[0]],
        );
    }
}
