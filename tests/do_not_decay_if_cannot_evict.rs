//! §8 scenario 6, DoNotDecayIfCannotEvict: an ineligible item must never have its
//! frequency counter decayed, even across repeated visits — the counter only
//! starts moving once the item becomes eligible, per §7 NotEvictable.

use mempager::item::INITIAL_FREQ_COUNT;
use mempager::{
    BucketType, EvictionPolicy, Item, PagerType, PagingVisitor, Phase, VBucket, VBucketState,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use mempager::BucketStats;
use mempager::clock::ManualClock;

fn visitor(bucket_type: BucketType, phase: Phase, clock: &ManualClock) -> PagingVisitor<'_> {
    PagingVisitor {
        bucket_type,
        policy: EvictionPolicy::HifiMfu,
        pager_type: PagerType::ItemPager,
        phase,
        eviction_ratio: 1.0,
        freq_percentile: 0,
        age_percentile: 0,
        low_watermark_slack: 0.02,
        fixed_thresholds: Some((0, 0)),
        available: Arc::new(AtomicBool::new(true)),
        clock,
    }
}

#[test]
fn ineligible_replica_item_keeps_freq_unchanged_across_many_visits() {
    let vb = VBucket::new(0, VBucketState::Replica);
    vb.upsert(Item::new("k", vec![0u8; 64]));
    let stats = BucketStats::default();
    let clock = ManualClock::new(0);

    for _ in 0..=u32::from(INITIAL_FREQ_COUNT) {
        let v = visitor(BucketType::EphemeralAutoDelete, Phase::ReplicaOnly, &clock);
        let outcome = v.visit(&vb, &stats, 0);
        assert_eq!(outcome.ejected, 0);
    }

    let items = vb.snapshot_items();
    assert_eq!(items[0].freq(), INITIAL_FREQ_COUNT, "ineligible item's frequency must never decay");
}

#[test]
fn becoming_eligible_does_not_immediately_evict_from_a_full_counter() {
    let vb = VBucket::new(0, VBucketState::Active);
    let mut item = Item::new("k", vec![0u8; 64]);
    item.mark_clean();
    vb.upsert(item);
    let stats = BucketStats::default();
    let clock = ManualClock::new(0);

    let v = visitor(BucketType::Persistent { full_eviction: false }, Phase::ActiveAndPendingOnly, &clock);
    let outcome = v.visit(&vb, &stats, 0);

    assert_eq!(outcome.ejected, 0, "a freshly-eligible item at full frequency must survive its first visit");
    let items = vb.snapshot_items();
    assert_eq!(items[0].freq(), u8::from(INITIAL_FREQ_COUNT) - 1, "decay begins only once the item is eligible");
}
