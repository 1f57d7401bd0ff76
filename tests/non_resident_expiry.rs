//! §8 scenario 8, NonResidentExpiry: a persistent item that was flushed and then
//! had its value ejected (non-resident) must still be found and deleted by the
//! `ExpiryPager` once its TTL elapses — expiry does not require residency.

use mempager::{
    Bucket, BucketType, EvictionPolicy, ExpiryPager, Item, ItemPager, ManualClock, PagerConfig, VBucketState,
};

#[test]
fn expiry_pager_removes_non_resident_expired_item() {
    let bucket = Bucket::new(BucketType::Persistent { full_eviction: false }, 1000, 100, 500).unwrap();
    let vb = bucket.create_vbucket(0, VBucketState::Active);

    let mut item = Item::new("k", vec![0u8; 128]);
    item.exptime = 5;
    let delta = vb.upsert(item);
    bucket.stats.add_bytes(delta);

    // Flusher makes the item clean, then the item pager ejects its value
    // (non-resident) well before its TTL elapses.
    vb.visit_mut(|it| {
        it.mark_clean();
        mempager::ItemAction::Keep
    });
    vb.visit_mut(|it| {
        it.age_by_one();
        it.age_by_one();
        it.age_by_one();
        mempager::ItemAction::Keep
    });

    let clock = ManualClock::new(0);
    let pager = ItemPager::new(EvictionPolicy::TwoBitLru);
    let mut cfg = PagerConfig::default();
    cfg.ht_eviction_policy = EvictionPolicy::TwoBitLru;
    pager.run(&bucket, &cfg, &clock);

    assert_eq!(vb.len(), 1);
    assert!(!vb.snapshot_items()[0].is_resident());
    assert_eq!(vb.stats.snapshot().num_non_resident, 1);

    let clock = ManualClock::new(10);
    let expiry_pager = ExpiryPager::new(60, 0);
    let summary = expiry_pager.tick(&bucket, &cfg, &clock);

    assert_eq!(summary.expired, 1);
    assert_eq!(vb.len(), 0);
    assert_eq!(vb.stats.snapshot().num_items, 0);
    assert_eq!(vb.stats.snapshot().num_non_resident, 0);
}
