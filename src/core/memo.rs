//! In-process memoization over store-backed calls.
//!
//! Keyed by the same deterministic storage key as the on-disk store, so two
//! call sites with equal effective arguments share one entry. Purely an
//! acceleration layer — eviction or expiry just means the next call goes
//! back through the store.

use crate::core::discover;
use crate::core::error::DatastowError;
use crate::core::registry::{ArgumentSet, Artifact, StorableFn};
use crate::core::repr;
use crate::core::store::Store;
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(3600);

pub struct MemoCache {
    expiry: Duration,
    entries: FxHashMap<String, (Instant, Artifact)>,
}

impl Default for MemoCache {
    fn default() -> Self {
        MemoCache::new()
    }
}

impl MemoCache {
    pub fn new() -> Self {
        MemoCache::with_expiry(DEFAULT_EXPIRY)
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        MemoCache {
            expiry,
            entries: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a call through the cache: a fresh entry short-circuits both
    /// recomputation and the disk read; otherwise the store resolves the
    /// call and the result is cached.
    pub fn call(
        &mut self,
        store: &Store,
        function: &StorableFn,
        supplied: &ArgumentSet,
    ) -> Result<Artifact, DatastowError> {
        let completed = discover::complete(function, supplied)?;
        let key = format!(
            "{}\u{0}{}",
            function.identity(),
            repr::storage_key(&completed)
        );

        if let Some((inserted, artifact)) = self.entries.get(&key) {
            if inserted.elapsed() < self.expiry {
                return Ok(artifact.clone());
            }
        }

        let artifact = store.call(function, &completed)?;
        self.entries
            .insert(key, (Instant::now(), artifact.clone()));
        Ok(artifact)
    }

    /// Drop every entry older than the configured expiry.
    pub fn purge_expired(&mut self) {
        let expiry = self.expiry;
        self.entries
            .retain(|_, (inserted, _)| inserted.elapsed() < expiry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
