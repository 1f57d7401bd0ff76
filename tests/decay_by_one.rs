//! §8 scenario 5, DecayByOne: repeatedly visiting a single eligible item with
//! `freqThreshold = 0` should decay its frequency counter by one per pass until
//! it finally crosses the threshold and gets evicted, taking at most
//! `initialFreqCount` passes.

use mempager::item::INITIAL_FREQ_COUNT;
use mempager::{
    Bucket, BucketType, EvictionPolicy, Item, ManualClock, PagerType, PagingVisitor, Phase, VBucketState,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[test]
fn single_item_eventually_evicted_within_initial_freq_count_passes() {
    let bucket = Bucket::new(BucketType::Persistent { full_eviction: false }, 64 * 1024, 8 * 1024, 16 * 1024).unwrap();
    let vb = bucket.create_vbucket(0, VBucketState::Active);
    let mut item = Item::new("k", vec![0u8; 64]);
    item.mark_clean();
    vb.upsert(item);
    let clock = ManualClock::new(0);

    let mut passes = 0u32;
    let mut ejected_total = 0u64;
    while passes < u32::from(INITIAL_FREQ_COUNT) + 1 && ejected_total == 0 {
        let visitor = PagingVisitor {
            bucket_type: bucket.bucket_type,
            policy: EvictionPolicy::HifiMfu,
            pager_type: PagerType::ItemPager,
            phase: Phase::ActiveAndPendingOnly,
            eviction_ratio: 0.0,
            freq_percentile: 0,
            age_percentile: 0,
            low_watermark_slack: 0.02,
            fixed_thresholds: Some((0, 0)),
            available: Arc::new(AtomicBool::new(true)),
            clock: &clock,
        };
        let outcome = visitor.visit(&vb, &bucket.stats, bucket.mem_low_wat);
        ejected_total += outcome.ejected;
        passes += 1;
    }

    assert!(ejected_total == 1, "item should eventually be evicted");
    assert!(passes <= u32::from(INITIAL_FREQ_COUNT), "should take at most initialFreqCount passes, took {passes}");
}
