//! Snapshot cache of resolved discovery specifications.

use arc_swap::ArcSwap;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Resolved addresses keyed by the specification string that produced them.
pub type Resolved = HashMap<String, Vec<String>>;

/// Cache of resolved specifications.
///
/// Reads never block: each one observes a complete snapshot published by
/// [`Cache::update`]. Writers are expected to be serialized by the caller.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: Arc<ArcSwap<Resolved>>,
}

impl Cache {
    /// Flattens every entry's addresses into one list.
    ///
    /// Order across specifications is unspecified and duplicates between
    /// specifications are kept.
    pub fn addresses(&self) -> Vec<String> {
        self.entries.load().values().flatten().cloned().collect()
    }

    /// Gets the addresses cached for `spec`.
    pub fn get(&self, spec: &str) -> Option<Vec<String>> {
        self.entries.load().get(spec).cloned()
    }

    /// Gets the set of cached specifications.
    pub fn keys(&self) -> HashSet<String> {
        self.entries.load().keys().cloned().collect()
    }

    /// Gets the current snapshot.
    pub fn snapshot(&self) -> Arc<Resolved> {
        self.entries.load_full()
    }

    /// Stages changes against the current snapshot and publishes them at once.
    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut Entries) -> T) -> T {
        let mut entries = Entries {
            inner: Resolved::clone(&self.entries.load()),
        };
        let out = f(&mut entries);
        self.entries.store(Arc::new(entries.inner));
        out
    }
}

/// Staged copy of the cache handed out by [`Cache::update`].
#[derive(Debug)]
pub(crate) struct Entries {
    inner: Resolved,
}

impl Entries {
    pub(crate) fn get(&self, spec: &str) -> Option<&[String]> {
        self.inner.get(spec).map(Vec::as_slice)
    }

    pub(crate) fn put(&mut self, spec: impl Into<String>, addresses: Vec<String>) {
        self.inner.insert(spec.into(), addresses);
    }

    pub(crate) fn delete(&mut self, spec: &str) -> Option<Vec<String>> {
        self.inner.remove(spec)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }
}
