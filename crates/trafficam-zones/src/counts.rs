use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Object ids per `(exit zone, entry zone)` pair.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CountIndex {
    by_exit: BTreeMap<usize, BTreeMap<usize, BTreeSet<u64>>>,
}

impl CountIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the id was already counted for this pair.
    pub fn insert(&mut self, exit_zone: usize, entry_zone: usize, object_id: u64) -> bool {
        self.by_exit
            .entry(exit_zone)
            .or_default()
            .entry(entry_zone)
            .or_default()
            .insert(object_id)
    }

    pub fn get(&self, exit_zone: usize, entry_zone: usize) -> Option<&BTreeSet<u64>> {
        self.by_exit.get(&exit_zone)?.get(&entry_zone)
    }

    pub fn count(&self, exit_zone: usize, entry_zone: usize) -> usize {
        self.get(exit_zone, entry_zone).map_or(0, BTreeSet::len)
    }

    pub fn total(&self) -> usize {
        self.iter().map(|(_, _, ids)| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_exit.is_empty()
    }

    /// `(exit, entry, ids)` in ascending zone order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &BTreeSet<u64>)> + '_ {
        self.by_exit.iter().flat_map(|(&exit, entries)| {
            entries.iter().map(move |(&entry, ids)| (exit, entry, ids))
        })
    }
}
