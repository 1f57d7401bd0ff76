//! `ItemPager` (§4.3): orchestrates eviction across vBuckets when memory crosses
//! the high watermark.
//!
//! Grounded on the teacher's `Cache`'s background-eviction trigger, generalized
//! from "evict from one shared queue" to "enumerate vBuckets in phase-ordered
//! waves, dispatch a visitor per vBucket" per §4.3/§5's parent+per-vBucket-child
//! task decomposition.

use crate::bucket::{Bucket, BucketType};
use crate::clock::Clock;
use crate::config::{EvictionPolicy, PagerConfig};
use crate::paging_visitor::{PagerType, PagingVisitor, Phase, VisitOutcome};
use crate::vbucket::VBucketState;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// §4.3 "state machine (per run)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Idle,
    Scheduling,
    Dispatch,
    Awaiting,
    ReEvaluate,
}

/// Aggregate result of one `ItemPager::run()` (§4.3's `RE_EVALUATE` outcome).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub ejected: u64,
    pub expired: u64,
    pub visited: u64,
    pub waves: u32,
    /// §7 `PagerExhausted`: a full pass across all phases did not reach the low
    /// watermark.
    pub exhausted: bool,
}

/// Orchestrates `PagingVisitor` dispatch across a `Bucket`'s vBuckets.
///
/// Phase is held as a field mutated only by this instance's own `run()`, per §9's
/// "global pager state... hold as fields of the ItemPager instance, mutated only
/// from the pager task; publish to visitors via immutable snapshots passed at
/// task spawn" design note. `parking_lot::Mutex` stands in for "mutated only by
/// its own task" rather than implying concurrent access: callers are expected to
/// serialize `run()` invocations themselves (the teacher's `Cache` holds its
/// eviction trigger state the same way).
pub struct ItemPager {
    state: Mutex<PagerState>,
    phase: Mutex<Phase>,
}

impl ItemPager {
    #[must_use]
    pub fn new(initial_policy: EvictionPolicy) -> Self {
        Self {
            state: Mutex::new(PagerState::Idle),
            phase: Mutex::new(Self::initial_phase(BucketType::Persistent { full_eviction: false }, initial_policy)),
        }
    }

    #[must_use]
    pub fn state(&self) -> PagerState {
        *self.state.lock()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// §4.3 `SCHEDULING`'s starting phase. Ephemeral buckets (any algorithm) always
    /// start at `ACTIVE_AND_PENDING_ONLY` — they have no replica vBuckets to drain
    /// first. Persistent buckets start at the policy's own first phase.
    pub(crate) fn initial_phase(bucket_type: BucketType, policy: EvictionPolicy) -> Phase {
        if bucket_type.is_ephemeral() {
            return Phase::ActiveAndPendingOnly;
        }
        match policy {
            EvictionPolicy::TwoBitLru => Phase::PagingUnreferenced,
            EvictionPolicy::HifiMfu => Phase::ReplicaOnly,
        }
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        *self.phase.lock() = phase;
    }

    pub(crate) fn set_state(&self, state: PagerState) {
        *self.state.lock() = state;
    }

    pub(crate) fn next_phase(bucket_type: BucketType, current: Phase) -> Option<Phase> {
        match (bucket_type, current) {
            (BucketType::Persistent { .. }, Phase::ReplicaOnly) => Some(Phase::ActiveAndPendingOnly),
            (BucketType::Persistent { .. }, Phase::PagingUnreferenced) => Some(Phase::ReplicaOnly),
            (BucketType::Persistent { .. }, Phase::ActiveAndPendingOnly) => None,
            // Ephemeral buckets (any algorithm) start and stay at
            // ACTIVE_AND_PENDING_ONLY; replicas are never visited (§4.3).
            (_, _) => None,
        }
    }

    pub(crate) fn vbuckets_for_phase(bucket: &Bucket, phase: Phase) -> Vec<Arc<crate::vbucket::VBucket>> {
        match (bucket.bucket_type, phase) {
            (BucketType::Persistent { .. }, Phase::ReplicaOnly) => bucket.vbuckets_in_state(VBucketState::Replica),
            (BucketType::Persistent { .. }, _) => {
                let mut out = bucket.vbuckets_in_state(VBucketState::Active);
                out.extend(bucket.vbuckets_in_state(VBucketState::Pending));
                out.sort_by_key(|vb| vb.id);
                out
            }
            // Ephemeral: never dispatch to replicas, regardless of phase.
            (_, _) => {
                let mut out = bucket.vbuckets_in_state(VBucketState::Active);
                out.extend(bucket.vbuckets_in_state(VBucketState::Pending));
                out.sort_by_key(|vb| vb.id);
                out
            }
        }
    }

    /// Runs one full scheduling pass: `SCHEDULING → DISPATCH → AWAITING →
    /// RE_EVALUATE`, advancing phases until either the low watermark is reached
    /// or all phases for this bucket type/policy are exhausted.
    pub fn run(&self, bucket: &Bucket, config: &PagerConfig, clock: &dyn Clock) -> RunSummary {
        if !bucket.bucket_type.has_item_pager() {
            return RunSummary::default();
        }
        *self.state.lock() = PagerState::Scheduling;
        // §4.3 computes the starting phase fresh on every run rather than only on a
        // policy change: a prior run may have advanced past ReplicaOnly, and that
        // must not leak into a later same-policy run (§7 PolicyChanged's intent
        // generalizes to "no phase state survives across runs").
        *self.phase.lock() = Self::initial_phase(bucket.bucket_type, config.ht_eviction_policy);

        let mut summary = RunSummary::default();
        let available = Arc::new(AtomicBool::new(true));
        let eviction_ratio = if bucket.is_above_high_watermark() {
            let span = (bucket.mem_high_wat - bucket.mem_low_wat).max(1) as f64;
            ((bucket.stats.bytes_used() as f64 - bucket.mem_low_wat as f64) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        loop {
            let phase = self.phase();
            *self.state.lock() = PagerState::Dispatch;
            let vbuckets = Self::vbuckets_for_phase(bucket, phase);

            *self.state.lock() = PagerState::Awaiting;
            for vb in &vbuckets {
                let visitor = PagingVisitor {
                    bucket_type: bucket.bucket_type,
                    policy: config.ht_eviction_policy,
                    pager_type: PagerType::ItemPager,
                    phase,
                    eviction_ratio,
                    freq_percentile: config.item_eviction_freq_counter_age_threshold,
                    age_percentile: config.item_eviction_age_percentage,
                    low_watermark_slack: config.low_watermark_slack,
                    fixed_thresholds: None,
                    available: available.clone(),
                    clock,
                };
                let outcome: VisitOutcome = visitor.visit(vb, &bucket.stats, bucket.mem_low_wat);
                summary.ejected += outcome.ejected;
                summary.expired += outcome.expired;
                summary.visited += outcome.visited;
                log::debug!(
                    "paging out items: vb={} phase={:?} ejected={} expired={} visited={}",
                    vb.id,
                    phase,
                    outcome.ejected,
                    outcome.expired,
                    outcome.visited
                );
            }
            summary.waves += 1;

            *self.state.lock() = PagerState::ReEvaluate;
            if bucket.is_below_low_watermark() {
                break;
            }
            match Self::next_phase(bucket.bucket_type, phase) {
                Some(next) => *self.phase.lock() = next,
                None => {
                    summary.exhausted = true;
                    bucket.stats.pager_exhausted.fetch_add(1, Ordering::Relaxed);
                    log::warn!("item pager exhausted all phases without reaching the low watermark");
                    break;
                }
            }
        }

        bucket.stats.pager_runs.fetch_add(1, Ordering::Relaxed);
        *self.state.lock() = PagerState::Idle;
        summary
    }
}
