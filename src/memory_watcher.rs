//! Memory watcher (§4.5): tracks estimated bytes used against quota and
//! watermarks, rejecting allocations that would cross the quota and waking the
//! relevant pager.
//!
//! Grounded on the teacher's `CacheMetrics` atomic-counter bookkeeping, adding
//! the "reserve before write, fail fast, wake the pager" allocation-gate
//! behaviour `CacheMetrics` itself doesn't need (the teacher's cache has no hard
//! quota to enforce).

use crate::bucket::Bucket;
use crate::errors::PagerError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Wraps a `Bucket`'s stats with the allocation-gating and wake-coalescing
/// behaviour §4.5 describes. Cheap to construct per-bucket; holds no data of its
/// own beyond the coalescing flags, since `Bucket::stats.bytes_used` is already
/// the authoritative counter.
pub struct MemoryWatcher {
    /// §4.5 "idempotent wake: repeated notifications while the pager is running
    /// coalesce" — a pending-wake flag rather than a counter, so N notifications
    /// collapse to a single pending run.
    item_pager_wake_pending: AtomicBool,
    expiry_pager_wake_pending: AtomicBool,
}

impl Default for MemoryWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWatcher {
    #[must_use]
    pub fn new() -> Self {
        Self { item_pager_wake_pending: AtomicBool::new(false), expiry_pager_wake_pending: AtomicBool::new(false) }
    }

    /// Attempts to account for `additional_bytes` against `bucket`'s quota. On
    /// success, also wakes the pager if the post-reservation total crosses the
    /// high watermark (§4.5: "When `used > mem_high_wat` it wakes the pager
    /// regardless of allocation outcome").
    ///
    /// # Errors
    /// Returns `PagerError::BucketFull` (§7 `QuotaExceeded`) if reserving
    /// `additional_bytes` would cross `bucket.max_size`, and wakes the
    /// appropriate pager without committing the reservation.
    pub fn reserve(&self, bucket: &Bucket, additional_bytes: u64) -> Result<(), PagerError> {
        let used = bucket.stats.bytes_used();
        let would_use = used.saturating_add(additional_bytes);
        if would_use > bucket.max_size {
            self.wake_for(bucket);
            return Err(PagerError::BucketFull { used: would_use, max_size: bucket.max_size });
        }
        bucket.stats.add_bytes(additional_bytes as i64);
        if would_use > bucket.mem_high_wat {
            self.wake_for(bucket);
        }
        Ok(())
    }

    /// Records that `freed_bytes` were released back to the bucket (e.g. after an
    /// eviction sweep lands), independent of `reserve`'s bookkeeping.
    pub fn release(&self, bucket: &Bucket, freed_bytes: u64) {
        bucket.stats.add_bytes(-(freed_bytes as i64));
    }

    fn wake_for(&self, bucket: &Bucket) {
        if bucket.bucket_type.has_item_pager() {
            self.item_pager_wake_pending.store(true, Ordering::Relaxed);
        } else {
            // Ephemeral-fail-new-data: "the memory watcher schedules the expiry
            // pager instead" (§4.4).
            self.expiry_pager_wake_pending.store(true, Ordering::Relaxed);
        }
    }

    /// Consumes a pending item-pager wake, if any. Callers (the executor's
    /// scheduling loop) poll this rather than the watcher calling back into the
    /// pager directly, keeping `MemoryWatcher` decoupled from `ItemPager`.
    pub fn take_item_pager_wake(&self) -> bool {
        self.item_pager_wake_pending.swap(false, Ordering::Relaxed)
    }

    pub fn take_expiry_pager_wake(&self) -> bool {
        self.expiry_pager_wake_pending.swap(false, Ordering::Relaxed)
    }
}
