//! `Bucket` (§3): owns a set of `VBucket`s, a quota, watermarks, and aggregate stats.
//!
//! Generalizes the teacher's `Engine` (a `RwLock<HashMap<String, Arc<Collection>>>`
//! plus a storage handle) into `Bucket`, which owns `RwLock<HashMap<VBucketId,
//! Arc<VBucket>>>` plus the quota/watermark/full-policy fields §3 attaches at the
//! bucket level rather than per-collection.

use crate::errors::PagerError;
use crate::vbucket::{VBucket, VBucketId, VBucketState};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// §3 "one of {persistent, ephemeral-auto-delete, ephemeral-fail-new-data}", folding
/// in §6's "persistent value_only / persistent full_eviction" split as a secondary
/// field on the `Persistent` variant (full-eviction buckets may also page out
/// metadata for non-resident keys; value-only buckets never do — but both still run
/// the same `ItemPager`, so it's a flag rather than a fourth bucket-type case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketType {
    Persistent { full_eviction: bool },
    EphemeralAutoDelete,
    EphemeralFailNewData,
}

impl BucketType {
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Persistent { .. })
    }

    #[must_use]
    pub const fn is_ephemeral(self) -> bool {
        !self.is_persistent()
    }

    /// Whether this bucket type has an `ItemPager` at all — §4.4: "for the
    /// ephemeral-fail-new-data bucket, the ExpiryPager is the only
    /// memory-reclamation mechanism (there is no ItemPager)".
    #[must_use]
    pub const fn has_item_pager(self) -> bool {
        !matches!(self, Self::EphemeralFailNewData)
    }
}

/// Aggregate, bucket-wide atomic counters (§3 "aggregate stats (bytes used,
/// eviction/expiry counters)"), mirroring the teacher's `CacheMetrics` pattern.
#[derive(Default)]
pub struct BucketStats {
    pub bytes_used: AtomicU64,
    pub num_value_ejects: AtomicU64,
    pub num_items_deleted: AtomicU64,
    pub expired_pager: AtomicU64,
    pub expired_access: AtomicU64,
    pub expired_compactor: AtomicU64,
    pub pager_runs: AtomicU64,
    pub pager_exhausted: AtomicU64,
}

impl BucketStats {
    #[must_use]
    pub fn bytes_used(&self) -> u64 {
        self.bytes_used.load(Ordering::Relaxed)
    }

    pub fn add_bytes(&self, delta: i64) {
        if delta >= 0 {
            self.bytes_used.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.bytes_used.fetch_sub(delta.unsigned_abs(), Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> BucketStatsSnapshot {
        BucketStatsSnapshot {
            bytes_used: self.bytes_used(),
            num_value_ejects: self.num_value_ejects.load(Ordering::Relaxed),
            num_items_deleted: self.num_items_deleted.load(Ordering::Relaxed),
            expired_pager: self.expired_pager.load(Ordering::Relaxed),
            expired_access: self.expired_access.load(Ordering::Relaxed),
            expired_compactor: self.expired_compactor.load(Ordering::Relaxed),
            pager_runs: self.pager_runs.load(Ordering::Relaxed),
            pager_exhausted: self.pager_exhausted.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn total_expired(&self) -> u64 {
        self.expired_pager.load(Ordering::Relaxed)
            + self.expired_access.load(Ordering::Relaxed)
            + self.expired_compactor.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BucketStatsSnapshot {
    pub bytes_used: u64,
    pub num_value_ejects: u64,
    pub num_items_deleted: u64,
    pub expired_pager: u64,
    pub expired_access: u64,
    pub expired_compactor: u64,
    pub pager_runs: u64,
    pub pager_exhausted: u64,
}

/// A top-level namespace with its own quota, vBuckets, and policies (§3).
pub struct Bucket {
    pub bucket_type: BucketType,
    pub max_size: u64,
    pub mem_low_wat: u64,
    pub mem_high_wat: u64,
    vbuckets: RwLock<HashMap<VBucketId, Arc<VBucket>>>,
    pub stats: BucketStats,
}

impl Bucket {
    /// # Errors
    /// Returns `PagerError::InvalidWatermarks` if
    /// `mem_low_wat < mem_high_wat < max_size` does not hold.
    pub fn new(bucket_type: BucketType, max_size: u64, mem_low_wat: u64, mem_high_wat: u64) -> Result<Self, PagerError> {
        if !(mem_low_wat < mem_high_wat && mem_high_wat < max_size) {
            return Err(PagerError::InvalidWatermarks { low: mem_low_wat, high: mem_high_wat, max: max_size });
        }
        Ok(Self {
            bucket_type,
            max_size,
            mem_low_wat,
            mem_high_wat,
            vbuckets: RwLock::new(HashMap::new()),
            stats: BucketStats::default(),
        })
    }

    pub fn create_vbucket(&self, id: VBucketId, state: VBucketState) -> Arc<VBucket> {
        let vb = Arc::new(VBucket::new(id, state));
        self.vbuckets.write().insert(id, vb.clone());
        vb
    }

    #[must_use]
    pub fn get_vbucket(&self, id: VBucketId) -> Option<Arc<VBucket>> {
        self.vbuckets.read().get(&id).cloned()
    }

    pub fn delete_vbucket(&self, id: VBucketId) -> bool {
        self.vbuckets.write().remove(&id).is_some()
    }

    /// Online vBuckets matching `state`, sorted by id for deterministic dispatch
    /// order within a phase (§5: "across vBuckets, no global ordering is
    /// guaranteed except the phase contract").
    #[must_use]
    pub fn vbuckets_in_state(&self, state: VBucketState) -> Vec<Arc<VBucket>> {
        let mut out: Vec<Arc<VBucket>> =
            self.vbuckets.read().values().filter(|vb| vb.state() == state).cloned().collect();
        out.sort_by_key(|vb| vb.id);
        out
    }

    #[must_use]
    pub fn all_vbuckets(&self) -> Vec<Arc<VBucket>> {
        let mut out: Vec<Arc<VBucket>> = self.vbuckets.read().values().cloned().collect();
        out.sort_by_key(|vb| vb.id);
        out
    }

    #[must_use]
    pub fn is_below_low_watermark(&self) -> bool {
        self.stats.bytes_used() < self.mem_low_wat
    }

    #[must_use]
    pub fn is_above_high_watermark(&self) -> bool {
        self.stats.bytes_used() > self.mem_high_wat
    }
}
