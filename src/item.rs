//! The `Item` data model (§3).
//!
//! Generalizes the teacher's `document::core::Document` (id, BSON payload,
//! `Metadata { document_type, created_at, updated_at, ttl }`) into the fuller field
//! set an item in a memory-pressure-aware KV bucket needs: a frequency counter *and*
//! a 2-bit LRU age (the teacher only ever needed TTL + LRU-queue position, since its
//! `Cache` wraps the `lru` crate), a dirty bit (persistence pending), a deleted bit,
//! and a system/user xattr split for tombstone survival (§3, §8 scenario 9).

use crate::clock::{Clock, EpochSecs};
use crate::vbucket::VBucketId;

/// Frequency counter saturates at this value (§3: "saturates at an
/// implementation-defined maximum (e.g. 255)").
pub const FREQ_COUNTER_MAX: u8 = u8::MAX;

/// 2-bit LRU age saturates at this value ("least recently used").
pub const LRU_AGE_MAX: u8 = 3;

/// Starting frequency assigned to every freshly inserted item (§4.1
/// `initialFreqCount`), chosen so a single decrement cycle cannot immediately
/// evict a brand new item.
pub const INITIAL_FREQ_COUNT: u8 = 4;

/// Data-type flags carried alongside the value (§3 "a data-type flag set").
///
/// A hand-rolled three-bit flag set rather than pulling in `bitflags` for this alone;
/// the teacher doesn't depend on `bitflags` either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataTypeFlags(u8);

impl DataTypeFlags {
    pub const RAW: Self = Self(0);
    pub const JSON: Self = Self(1 << 0);
    pub const SNAPPY: Self = Self(1 << 1);
    pub const XATTR: Self = Self(1 << 2);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// A system/user xattr split. Deletion prunes `user` but preserves `system` as a
/// tombstone carrier (§3, §4.2 step 2, §8 scenario 9's `_sync` xattr).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XattrSegment {
    pub user: Vec<u8>,
    pub system: Vec<u8>,
}

impl XattrSegment {
    #[must_use]
    pub fn new(user: Vec<u8>, system: Vec<u8>) -> Self {
        Self { user, system }
    }

    /// Prunes the user xattr segment, keeping only the system segment.
    pub fn prune_user(&mut self) {
        self.user.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.system.is_empty()
    }
}

/// A single key-value item, identified by `(vbid, key)` at the `VBucket` level.
#[derive(Debug, Clone)]
pub struct Item {
    pub key: String,
    pub value: Vec<u8>,
    pub data_type: DataTypeFlags,
    pub flags: u32,
    pub cas: u64,
    pub rev_seq: u64,
    /// Absolute seconds since epoch; 0 means no TTL.
    pub exptime: EpochSecs,
    pub xattrs: XattrSegment,
    resident: bool,
    dirty: bool,
    deleted: bool,
    freq: u8,
    lru_age: u8,
    /// Checkpoint (and other external reader) reference count. > 1 pins the item.
    checkpoint_refs: u32,
}

impl Item {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
            data_type: DataTypeFlags::RAW,
            flags: 0,
            cas: 1,
            rev_seq: 1,
            exptime: 0,
            xattrs: XattrSegment::default(),
            resident: true,
            dirty: true,
            deleted: false,
            freq: INITIAL_FREQ_COUNT,
            lru_age: 0,
            checkpoint_refs: 0,
        }
    }

    #[must_use]
    pub const fn is_resident(&self) -> bool {
        self.resident
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    #[must_use]
    pub const fn freq(&self) -> u8 {
        self.freq
    }

    #[must_use]
    pub const fn lru_age(&self) -> u8 {
        self.lru_age
    }

    #[must_use]
    pub const fn checkpoint_refs(&self) -> u32 {
        self.checkpoint_refs
    }

    /// Marks the item clean, as the external `Flusher` would after persisting it.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn pin_for_checkpoint(&mut self) {
        self.checkpoint_refs += 1;
    }

    pub fn unpin_checkpoint(&mut self) {
        self.checkpoint_refs = self.checkpoint_refs.saturating_sub(1);
    }

    /// Touches the item on read/write: resets LRU age to most-recently-used and
    /// bumps the frequency counter, saturating at `FREQ_COUNTER_MAX`.
    pub fn touch(&mut self) {
        self.lru_age = 0;
        self.freq = self.freq.saturating_add(1).min(FREQ_COUNTER_MAX);
    }

    /// Ages the item by one LRU generation, saturating at `LRU_AGE_MAX`
    /// ("least recently used").
    pub fn age_by_one(&mut self) {
        self.lru_age = (self.lru_age + 1).min(LRU_AGE_MAX);
    }

    /// Graceful decay of the frequency counter (§4.2 step 3, hifi_mfu). Never called
    /// on an ineligible item — per §7 `NotEvictable`, a transient pin must not cost
    /// a hot item its counter.
    pub fn decay_freq(&mut self) {
        self.freq = self.freq.saturating_sub(1);
    }

    #[must_use]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.exptime != 0 && self.exptime <= clock.now()
    }

    /// §4.2 eviction action on a persistent bucket: drop the value blob, keep
    /// metadata, mark non-resident. Returns the number of bytes freed.
    pub fn eject_value(&mut self) -> usize {
        let freed = self.value.len();
        self.value.clear();
        self.value.shrink_to_fit();
        self.resident = false;
        freed
    }

    /// Deletes the item's user payload; if `preserve_system_xattrs`, the system
    /// xattr segment survives as a tombstone (§3, §4.2 step 2, §8 scenario 9).
    pub fn delete(&mut self, preserve_system_xattrs: bool) -> usize {
        let freed = self.value.len() + self.xattrs.user.len();
        self.value.clear();
        self.value.shrink_to_fit();
        self.xattrs.prune_user();
        if !preserve_system_xattrs {
            self.xattrs.system.clear();
        }
        self.deleted = true;
        self.resident = false;
        freed
    }

    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.value.len() + self.xattrs.user.len() + self.xattrs.system.len() + self.key.len() + 64
    }
}

/// An item's identity within a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub vbid: VBucketId,
    pub key: String,
}
