//! `VBucket` (§3): a partition of the keyspace with a state and a hash table of
//! `Item`s.
//!
//! Generalizes the teacher's `collection::core::Collection` (name + `Cache` +
//! WAL handle behind `parking_lot` locks) into a `VBucket` holding a plain
//! `HashMap<String, Item>` behind a `parking_lot::RwLock` (the "hash table" §6
//! treats as an external collaborator elsewhere in production ep-engine, but
//! which this crate owns directly since no separate storage-engine crate is in
//! scope here) plus replication state and aggregate per-vBucket stats.

use crate::item::Item;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub type VBucketId = u16;

/// §3 "a state ∈ {active, replica, pending, dead}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VBucketState {
    Active,
    Replica,
    Pending,
    Dead,
}

/// Atomic per-vBucket counters, mirroring the teacher's `CacheMetrics` shape
/// (plain `AtomicU64` fields plus a `snapshot()` accessor).
#[derive(Default)]
pub struct VBucketStats {
    pub num_items: AtomicU64,
    pub num_non_resident: AtomicU64,
    pub num_value_ejects: AtomicU64,
    pub expired_pager: AtomicU64,
    pub expired_access: AtomicU64,
    pub expired_compactor: AtomicU64,
}

impl VBucketStats {
    #[must_use]
    pub fn snapshot(&self) -> VBucketStatsSnapshot {
        VBucketStatsSnapshot {
            num_items: self.num_items.load(Ordering::Relaxed),
            num_non_resident: self.num_non_resident.load(Ordering::Relaxed),
            num_value_ejects: self.num_value_ejects.load(Ordering::Relaxed),
            expired_pager: self.expired_pager.load(Ordering::Relaxed),
            expired_access: self.expired_access.load(Ordering::Relaxed),
            expired_compactor: self.expired_compactor.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VBucketStatsSnapshot {
    pub num_items: u64,
    pub num_non_resident: u64,
    pub num_value_ejects: u64,
    pub expired_pager: u64,
    pub expired_access: u64,
    pub expired_compactor: u64,
}

/// A partition of the keyspace. Owns its item hash table; the checkpoint manager
/// that may pin items (§3, §9) is represented only by the `checkpoint_refs` field
/// already present on each `Item` — no separate checkpoint-manager type is needed
/// since the pager only ever needs to *read* that refcount (§9 design note:
/// "eviction consults the handle count via an accessor rather than inspecting
/// storage directly").
pub struct VBucket {
    pub id: VBucketId,
    state: RwLock<VBucketState>,
    items: RwLock<HashMap<String, Item>>,
    pub stats: VBucketStats,
}

impl VBucket {
    #[must_use]
    pub fn new(id: VBucketId, state: VBucketState) -> Self {
        Self { id, state: RwLock::new(state), items: RwLock::new(HashMap::new()), stats: VBucketStats::default() }
    }

    #[must_use]
    pub fn state(&self) -> VBucketState {
        *self.state.read()
    }

    pub fn set_state(&self, state: VBucketState) {
        *self.state.write() = state;
    }

    /// Inserts or replaces an item, returning the bytes-used delta (new size minus
    /// any previously stored size for the same key). Does not touch the item —
    /// a freshly written item must carry exactly `INITIAL_FREQ_COUNT` (§4.1);
    /// recency/frequency bumps belong to read access (`get`) only.
    pub fn upsert(&self, item: Item) -> i64 {
        let new_size = item.approximate_size() as i64;
        let mut items = self.items.write();
        let old_size = items.get(&item.key).map(|old| old.approximate_size() as i64).unwrap_or(0);
        let was_present = items.contains_key(&item.key);
        items.insert(item.key.clone(), item);
        if !was_present {
            self.stats.num_items.fetch_add(1, Ordering::Relaxed);
        }
        new_size - old_size
    }

    /// Reads an item, touching its recency/frequency on access per normal KV
    /// semantics. Triggers `expired_access` accounting and deletion if the item's
    /// TTL has elapsed (§7 `ExpiredOnAccess`).
    pub fn get(&self, key: &str, clock: &dyn crate::clock::Clock) -> Option<Item> {
        let mut items = self.items.write();
        let expired = items.get(key).is_some_and(|it| it.is_expired(clock) && !it.is_deleted());
        if expired {
            if let Some(mut it) = items.remove(key) {
                let was_non_resident = !it.is_resident();
                let freed = it.delete(true);
                self.stats.expired_access.fetch_add(1, Ordering::Relaxed);
                self.stats.num_items.fetch_sub(1, Ordering::Relaxed);
                if was_non_resident {
                    self.stats.num_non_resident.fetch_sub(1, Ordering::Relaxed);
                }
                self.on_bytes_freed(freed);
            }
            return None;
        }
        let item = items.get_mut(key)?;
        if item.is_deleted() {
            return None;
        }
        item.touch();
        Some(item.clone())
    }

    pub fn remove(&self, key: &str) -> Option<Item> {
        let removed = self.items.write().remove(key);
        if removed.is_some() {
            self.stats.num_items.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn on_bytes_freed(&self, _freed: usize) {
        // Bytes-freed accounting is rolled up by the caller (the visitor holds the
        // bucket-wide stats handle); this hook exists so future per-vbucket byte
        // counters can be wired in without touching call sites.
    }

    /// Runs `f` over every live (non-deleted) item under the vBucket's write lock,
    /// honouring the teacher's per-partition-lock discipline (§5: "a visitor holds
    /// one partition lock at a time") by holding a single lock for the whole visit
    /// rather than re-acquiring per key.
    pub fn visit_mut<F>(&self, mut f: F)
    where
        F: FnMut(&mut Item) -> ItemAction,
    {
        let mut items = self.items.write();
        let mut to_remove = Vec::new();
        for (key, item) in items.iter_mut() {
            match f(item) {
                ItemAction::Keep => {}
                ItemAction::Remove => to_remove.push(key.clone()),
            }
        }
        if !to_remove.is_empty() {
            let removed = to_remove.len() as u64;
            for key in to_remove {
                items.remove(&key);
            }
            self.stats.num_items.fetch_sub(removed, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn snapshot_items(&self) -> Vec<Item> {
        self.items.read().values().cloned().collect()
    }
}

/// What `visit_mut`'s callback wants done with the item after inspecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Keep,
    Remove,
}
