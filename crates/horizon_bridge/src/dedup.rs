//! Dedup Index
//!
//! The set of `packetId::traceId` keys already accepted by this or an earlier
//! run. Seeded from the prior run state and the prior queue, so an intent an
//! operator can still see is never queued twice even if the state file was
//! lost.

use horizon_intent::{DedupKey, Intent};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupIndex {
    keys: BTreeSet<DedupKey>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of the persisted keys and the keys of every queued intent.
    pub fn seed<'a>(
        persisted: impl IntoIterator<Item = DedupKey>,
        queued: impl IntoIterator<Item = &'a Intent>,
    ) -> Self {
        let mut keys: BTreeSet<DedupKey> = persisted.into_iter().collect();
        keys.extend(queued.into_iter().filter_map(Intent::dedup_key));
        Self { keys }
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &DedupKey> {
        self.keys.iter()
    }
}

impl Extend<DedupKey> for DedupIndex {
    fn extend<I: IntoIterator<Item = DedupKey>>(&mut self, iter: I) {
        self.keys.extend(iter);
    }
}
