use educe::Educe;

#[derive(Clone, Copy, Educe)]
#[educe(Default)]
pub struct StoreConfig {
    /// Capacity of the tail set. One tail per tracked fork; the least
    /// recently extended fork is reclaimed when a new one would exceed this.
    #[educe(Default = 10)]
    pub fork_chain_limit: usize,
    /// Reserved for a seen-block cache in front of validation. Nothing on
    /// the reconciliation path consults it yet.
    #[educe(Default = 128)]
    pub lru_cache_limit: usize,
}

impl StoreConfig {
    /// A configuration small enough to exercise tail eviction in tests.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            fork_chain_limit: 2,
            ..Self::default()
        }
    }
}
