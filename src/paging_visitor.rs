//! `PagingVisitor` (§4.2): the per-vBucket scan that selects and acts on evictable
//! or expired items.
//!
//! Grounded on the teacher's cache eviction sweep (`cache::core`'s LRU-queue walk),
//! generalized from "evict the queue tail" to the fuller eligibility/eviction/
//! threshold-learning decision tree §4.2 specifies, and split into the policy- and
//! pager-type-tagged variants §9's "dispatch polymorphism" design note calls for
//! (a small set of tagged enums consulted at decision points, not an inheritance
//! hierarchy).

use crate::bucket::{BucketStats, BucketType};
use crate::clock::Clock;
use crate::config::EvictionPolicy;
use crate::histogram::ItemEvictionHistogram;
use crate::item::{Item, INITIAL_FREQ_COUNT, LRU_AGE_MAX};
use crate::vbucket::{ItemAction, VBucket, VBucketState, VBucketStats};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// §3/§4.3 pager phase. `ReplicaOnly`/`ActiveAndPendingOnly` double as the phase
/// filter §4.2 step 1 consults; `PagingUnreferenced` is 2-bit LRU's extra initial
/// phase and behaves like `ActiveAndPendingOnly` for eligibility purposes (the
/// "unreferenced" distinction is about *which* items within active/pending are
/// considered, handled by the LRU-age check itself rather than a separate filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ReplicaOnly,
    ActiveAndPendingOnly,
    PagingUnreferenced,
}

/// §4.2 "a pager type ∈ {ITEM_PAGER, EXPIRY_PAGER}".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerType {
    ItemPager,
    ExpiryPager,
}

/// §4.2 "Outputs: counts of items ejected, expired, visited; final thresholds used."
#[derive(Debug, Clone, Copy, Default)]
pub struct VisitOutcome {
    pub ejected: u64,
    pub expired: u64,
    pub visited: u64,
    pub freq_threshold: u8,
    pub age_threshold: u8,
}

/// One visitor instance scans exactly one vBucket for one phase/policy/pager-type
/// combination (§5: "the histogram inside a PagingVisitor is owned exclusively by
/// that task").
pub struct PagingVisitor<'a> {
    pub bucket_type: BucketType,
    pub policy: EvictionPolicy,
    pub pager_type: PagerType,
    pub phase: Phase,
    /// §4.2 "evictionRatio ∈ [0,1]": fraction of memory above the low watermark
    /// this pass must reclaim.
    pub eviction_ratio: f64,
    pub freq_percentile: u8,
    pub age_percentile: u8,
    pub low_watermark_slack: f64,
    /// Bypasses hifi_mfu's per-visit histogram learning with a pre-chosen
    /// `(freqThreshold, ageThreshold)` pair. `None` (the normal path) learns
    /// thresholds from the current population per §4.1/§4.2; `Some` is for
    /// driving the decay/eviction decision directly against a known threshold,
    /// as several of §8's concrete scenarios do ("run visitor repeatedly with
    /// freqThreshold = 0") where a single-item sample would otherwise make the
    /// learned threshold trivially equal to that item's own value.
    pub fixed_thresholds: Option<(u8, u8)>,
    /// §5 cancellation flag, shared with the vBucket-deletion path.
    pub available: Arc<AtomicBool>,
    pub clock: &'a dyn Clock,
}

impl<'a> PagingVisitor<'a> {
    /// §4.2 step 1 eligibility, minus the expiry check (handled separately since it
    /// applies "even non-resident" per the spec, ahead of eligibility).
    fn is_eviction_eligible(&self, item: &Item, vb_state: VBucketState) -> bool {
        if item.is_deleted() {
            return false;
        }
        match vb_state {
            VBucketState::Replica => {
                if self.phase != Phase::ReplicaOnly || self.bucket_type.is_ephemeral() {
                    return false;
                }
            }
            _ => {
                if self.phase == Phase::ReplicaOnly {
                    return false;
                }
            }
        }
        if self.bucket_type.is_persistent() && item.is_dirty() {
            return false;
        }
        if item.checkpoint_refs() > 1 {
            return false;
        }
        item.is_resident()
    }

    fn target_bytes(&self, mem_low_wat: u64) -> f64 {
        (mem_low_wat as f64) * (1.0 - self.eviction_ratio * self.low_watermark_slack)
    }

    fn below_target(&self, bucket_stats: &BucketStats, mem_low_wat: u64) -> bool {
        (bucket_stats.bytes_used() as f64) < self.target_bytes(mem_low_wat)
    }

    /// Evicts (or deletes, on ephemeral buckets) one item per §4.2 step 4, returning
    /// the number of bytes freed.
    fn evict_one(&self, item: &mut Item, bucket_stats: &BucketStats, vb_stats: &VBucketStats) -> bool {
        match self.bucket_type {
            BucketType::Persistent { .. } => {
                let freed = item.eject_value();
                bucket_stats.num_value_ejects.fetch_add(1, Ordering::Relaxed);
                bucket_stats.add_bytes(-(freed as i64));
                // §8: "num_items unchanged; num_non_resident increased by the
                // number evicted (persistent)".
                vb_stats.num_non_resident.fetch_add(1, Ordering::Relaxed);
                true
            }
            BucketType::EphemeralAutoDelete => {
                let freed = item.delete(true);
                bucket_stats.num_items_deleted.fetch_add(1, Ordering::Relaxed);
                bucket_stats.add_bytes(-(freed as i64));
                true
            }
            BucketType::EphemeralFailNewData => false,
        }
    }

    fn expire_one(&self, item: &mut Item, bucket_stats: &BucketStats, vb_stats: &VBucketStats) {
        let was_non_resident = !item.is_resident();
        let freed = item.delete(true);
        bucket_stats.add_bytes(-(freed as i64));
        // Both pager types attribute TTL deletions to `expired_pager` (§7);
        // `expired_access`/`expired_compactor` are incremented by the read path
        // and (out of scope) compactor respectively, not by this visitor.
        bucket_stats.expired_pager.fetch_add(1, Ordering::Relaxed);
        // The item is removed from the table entirely (§8 NonResidentExpiry):
        // drop its contribution to num_non_resident along with num_items.
        if was_non_resident {
            vb_stats.num_non_resident.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Runs one full visit of `vb`. Persistent/ephemeral-auto-delete items marked
    /// for deletion during the walk are removed from the hash table by `visit_mut`
    /// itself; ejected-but-not-deleted items (persistent eviction) stay resident
    /// in the table as non-resident metadata.
    pub fn visit(&self, vb: &VBucket, bucket_stats: &BucketStats, mem_low_wat: u64) -> VisitOutcome {
        let vb_state = vb.state();
        let mut outcome = VisitOutcome::default();

        if self.pager_type == PagerType::ExpiryPager {
            self.visit_expiry_only(vb, bucket_stats, &mut outcome);
            return outcome;
        }

        match self.policy {
            EvictionPolicy::TwoBitLru => self.visit_two_bit_lru(vb, vb_state, bucket_stats, mem_low_wat, &mut outcome),
            EvictionPolicy::HifiMfu => self.visit_hifi_mfu(vb, vb_state, bucket_stats, mem_low_wat, &mut outcome),
        }
        outcome
    }

    fn visit_expiry_only(&self, vb: &VBucket, bucket_stats: &BucketStats, outcome: &mut VisitOutcome) {
        let available = self.available.clone();
        let clock = self.clock;
        let mut expired = 0u64;
        let mut visited = 0u64;
        vb.visit_mut(|item| {
            if !available.load(Ordering::Relaxed) {
                return ItemAction::Keep;
            }
            visited += 1;
            if item.is_expired(clock) && !item.is_deleted() {
                self.expire_one(item, bucket_stats, &vb.stats);
                expired += 1;
                ItemAction::Remove
            } else {
                ItemAction::Keep
            }
        });
        outcome.expired = expired;
        outcome.visited = visited;
    }

    fn visit_two_bit_lru(
        &self,
        vb: &VBucket,
        vb_state: VBucketState,
        bucket_stats: &BucketStats,
        mem_low_wat: u64,
        outcome: &mut VisitOutcome,
    ) {
        let available = self.available.clone();
        let clock = self.clock;
        let mut ejected = 0u64;
        let mut expired = 0u64;
        let mut visited = 0u64;
        let mut stop = false;
        vb.visit_mut(|item| {
            if stop || !available.load(Ordering::Relaxed) {
                return ItemAction::Keep;
            }
            visited += 1;
            // Step 2: expiry check precedes eviction, unconditionally.
            if item.is_expired(clock) && !item.is_deleted() {
                self.expire_one(item, bucket_stats, &vb.stats);
                expired += 1;
                if self.below_target(bucket_stats, mem_low_wat) {
                    stop = true;
                }
                return ItemAction::Remove;
            }
            if self.is_eviction_eligible(item, vb_state) && item.lru_age() >= LRU_AGE_MAX {
                let action = if self.evict_one(item, bucket_stats, &vb.stats) {
                    ejected += 1;
                    match self.bucket_type {
                        BucketType::EphemeralAutoDelete => ItemAction::Remove,
                        _ => ItemAction::Keep,
                    }
                } else {
                    ItemAction::Keep
                };
                if self.below_target(bucket_stats, mem_low_wat) {
                    stop = true;
                }
                return action;
            }
            ItemAction::Keep
        });
        outcome.ejected = ejected;
        outcome.expired = expired;
        outcome.visited = visited;
        outcome.age_threshold = LRU_AGE_MAX;
    }

    /// hifi_mfu's two-pass threshold-learning walk (§4.2 "the visitor runs in
    /// two-pass fashion ... Pass 1 populates the histogram ... the learned
    /// thresholds are then applied during a second eviction pass").
    fn visit_hifi_mfu(
        &self,
        vb: &VBucket,
        vb_state: VBucketState,
        bucket_stats: &BucketStats,
        mem_low_wat: u64,
        outcome: &mut VisitOutcome,
    ) {
        let (freq_threshold, age_threshold) = match self.fixed_thresholds {
            Some(thresholds) => thresholds,
            None => {
                // Pass 1: learn thresholds from the eligible, non-expired population.
                // Items already expired are excluded from the sample since they'll be
                // removed by pass 2's expiry check before any eviction decision applies.
                let mut histogram = ItemEvictionHistogram::new();
                for item in vb.snapshot_items() {
                    let already_expired = item.is_expired(self.clock) && !item.is_deleted();
                    if !already_expired && self.is_eviction_eligible(&item, vb_state) {
                        histogram.add(item.freq(), item.lru_age());
                    }
                }
                histogram.thresholds(self.freq_percentile, self.age_percentile)
            }
        };
        outcome.freq_threshold = freq_threshold;
        outcome.age_threshold = age_threshold;

        let available = self.available.clone();
        let clock = self.clock;
        let mut ejected = 0u64;
        let mut expired = 0u64;
        let mut visited = 0u64;
        let mut stop = false;
        vb.visit_mut(|item| {
            if stop || !available.load(Ordering::Relaxed) {
                return ItemAction::Keep;
            }
            visited += 1;
            if item.is_expired(clock) && !item.is_deleted() {
                self.expire_one(item, bucket_stats, &vb.stats);
                expired += 1;
                if self.below_target(bucket_stats, mem_low_wat) {
                    stop = true;
                }
                return ItemAction::Remove;
            }
            if !self.is_eviction_eligible(item, vb_state) {
                // §7 NotEvictable: skip silently, never decay the counter.
                return ItemAction::Keep;
            }
            let should_evict = item.freq() <= freq_threshold
                && (item.lru_age() >= age_threshold || item.freq() < INITIAL_FREQ_COUNT);
            if should_evict {
                let action = if self.evict_one(item, bucket_stats, &vb.stats) {
                    ejected += 1;
                    match self.bucket_type {
                        BucketType::EphemeralAutoDelete => ItemAction::Remove,
                        _ => ItemAction::Keep,
                    }
                } else {
                    ItemAction::Keep
                };
                if self.below_target(bucket_stats, mem_low_wat) {
                    stop = true;
                }
                return action;
            }
            item.decay_freq();
            ItemAction::Keep
        });
        outcome.ejected = ejected;
        outcome.expired = expired;
        outcome.visited = visited;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketStats;
    use crate::clock::ManualClock;
    use crate::config::EvictionPolicy;
    use crate::item::Item;
    use std::sync::atomic::AtomicBool;

    fn available() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[test]
    fn two_bit_lru_evicts_only_aged_items() {
        let vb = VBucket::new(0, VBucketState::Active);
        let mut hot = Item::new("hot", vec![0u8; 100]);
        hot.mark_clean();
        let mut cold = Item::new("cold", vec![0u8; 100]);
        cold.mark_clean();
        vb.upsert(hot);
        vb.upsert(cold);
        // `upsert` always touches (freshly-written items are most-recently-used),
        // so age the "cold" item up to the eviction threshold afterwards.
        vb.visit_mut(|item| {
            if item.key == "cold" {
                item.age_by_one();
                item.age_by_one();
                item.age_by_one();
            }
            ItemAction::Keep
        });
        let stats = BucketStats::default();
        let clock = ManualClock::new(0);
        let visitor = PagingVisitor {
            bucket_type: BucketType::Persistent { full_eviction: false },
            policy: EvictionPolicy::TwoBitLru,
            pager_type: PagerType::ItemPager,
            phase: Phase::ActiveAndPendingOnly,
            eviction_ratio: 1.0,
            freq_percentile: 30,
            age_percentile: 30,
            low_watermark_slack: 0.02,
            fixed_thresholds: None,
            available: available(),
            clock: &clock,
        };
        let outcome = visitor.visit(&vb, &stats, 0);
        assert_eq!(outcome.ejected, 1);
        assert_eq!(stats.num_value_ejects.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn expiry_only_visit_removes_expired_and_ignores_eviction() {
        let vb = VBucket::new(0, VBucketState::Active);
        let mut item = Item::new("k", vec![1, 2, 3]);
        item.exptime = 10;
        vb.upsert(item);
        let stats = BucketStats::default();
        let clock = ManualClock::new(20);
        let visitor = PagingVisitor {
            bucket_type: BucketType::Persistent { full_eviction: false },
            policy: EvictionPolicy::TwoBitLru,
            pager_type: PagerType::ExpiryPager,
            phase: Phase::ActiveAndPendingOnly,
            eviction_ratio: 0.0,
            freq_percentile: 30,
            age_percentile: 30,
            low_watermark_slack: 0.02,
            fixed_thresholds: None,
            available: available(),
            clock: &clock,
        };
        let outcome = visitor.visit(&vb, &stats, 0);
        assert_eq!(outcome.expired, 1);
        assert_eq!(vb.len(), 0);
    }

    #[test]
    fn replica_not_paged_on_ephemeral() {
        let vb = VBucket::new(1, VBucketState::Replica);
        let item = Item::new("k", vec![0u8; 100]);
        vb.upsert(item);
        vb.visit_mut(|item| {
            item.age_by_one();
            item.age_by_one();
            item.age_by_one();
            ItemAction::Keep
        });
        let stats = BucketStats::default();
        let clock = ManualClock::new(0);
        let visitor = PagingVisitor {
            bucket_type: BucketType::EphemeralAutoDelete,
            policy: EvictionPolicy::TwoBitLru,
            pager_type: PagerType::ItemPager,
            phase: Phase::ReplicaOnly,
            eviction_ratio: 1.0,
            freq_percentile: 30,
            age_percentile: 30,
            low_watermark_slack: 0.02,
            fixed_thresholds: None,
            available: available(),
            clock: &clock,
        };
        let outcome = visitor.visit(&vb, &stats, 0);
        assert_eq!(outcome.ejected, 0);
        assert_eq!(vb.len(), 1);
    }

    #[test]
    fn dirty_item_not_evicted_on_persistent_bucket() {
        let vb = VBucket::new(0, VBucketState::Active);
        let item = Item::new("k", vec![0u8; 100]);
        assert!(item.is_dirty());
        vb.upsert(item);
        let stats = BucketStats::default();
        let clock = ManualClock::new(0);
        let visitor = PagingVisitor {
            bucket_type: BucketType::Persistent { full_eviction: false },
            policy: EvictionPolicy::HifiMfu,
            pager_type: PagerType::ItemPager,
            phase: Phase::ActiveAndPendingOnly,
            eviction_ratio: 1.0,
            freq_percentile: 100,
            age_percentile: 100,
            low_watermark_slack: 0.02,
            fixed_thresholds: None,
            available: available(),
            clock: &clock,
        };
        let outcome = visitor.visit(&vb, &stats, 0);
        assert_eq!(outcome.ejected, 0);
    }

    #[test]
    fn persistent_eviction_increments_vbucket_non_resident_count() {
        let vb = VBucket::new(0, VBucketState::Active);
        let mut item = Item::new("cold", vec![0u8; 100]);
        item.mark_clean();
        vb.upsert(item);
        vb.visit_mut(|item| {
            item.age_by_one();
            item.age_by_one();
            item.age_by_one();
            ItemAction::Keep
        });
        let stats = BucketStats::default();
        let clock = ManualClock::new(0);
        let visitor = PagingVisitor {
            bucket_type: BucketType::Persistent { full_eviction: false },
            policy: EvictionPolicy::TwoBitLru,
            pager_type: PagerType::ItemPager,
            phase: Phase::ActiveAndPendingOnly,
            eviction_ratio: 1.0,
            freq_percentile: 30,
            age_percentile: 30,
            low_watermark_slack: 0.02,
            fixed_thresholds: None,
            available: available(),
            clock: &clock,
        };
        let outcome = visitor.visit(&vb, &stats, 0);
        assert_eq!(outcome.ejected, 1);
        assert_eq!(vb.stats.snapshot().num_non_resident, 1);
        assert_eq!(vb.stats.snapshot().num_items, 1);
    }
}
