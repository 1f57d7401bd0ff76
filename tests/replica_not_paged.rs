//! §8 scenario 3, ReplicaNotPaged (ephemeral): an ephemeral bucket's replica
//! vBucket must never lose items to the item pager, regardless of how aged its
//! items are.

use mempager::{Bucket, BucketType, EvictionPolicy, Item, ItemAction, ItemPager, ManualClock, PagerConfig, VBucketState};

#[test]
fn ephemeral_replica_untouched_while_active_shrinks() {
    let bucket = Bucket::new(BucketType::EphemeralAutoDelete, 64 * 1024, 8 * 1024, 16 * 1024).unwrap();
    let active = bucket.create_vbucket(0, VBucketState::Active);
    let replica = bucket.create_vbucket(1, VBucketState::Replica);

    for i in 0..40 {
        let mut item = Item::new(format!("a{i}"), vec![0u8; 256]);
        item.mark_clean();
        let delta = active.upsert(item);
        bucket.stats.add_bytes(delta);
    }
    for i in 0..40 {
        let mut item = Item::new(format!("r{i}"), vec![0u8; 256]);
        item.mark_clean();
        let delta = replica.upsert(item);
        bucket.stats.add_bytes(delta);
    }
    // Age everything so both vBuckets have eviction candidates once a phase
    // actually visits them.
    for vb in [&active, &replica] {
        vb.visit_mut(|item| {
            item.age_by_one();
            item.age_by_one();
            item.age_by_one();
            ItemAction::Keep
        });
    }
    let replica_count_before = replica.len();

    let pager = ItemPager::new(EvictionPolicy::TwoBitLru);
    let mut cfg = PagerConfig::default();
    cfg.ht_eviction_policy = EvictionPolicy::TwoBitLru;
    let clock = ManualClock::new(0);
    pager.run(&bucket, &cfg, &clock);

    assert_eq!(replica.len(), replica_count_before, "ephemeral replica must never be paged");
    assert!(active.len() < 40, "active vBucket should have shrunk");
}
