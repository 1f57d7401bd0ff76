#![forbid(unsafe_code)]

//! A memory-pressure-driven item eviction and expiration engine for a
//! key-value bucket.
//!
//! Two cooperating subsystems form the core: an [`item_pager`], triggered by a
//! high-watermark crossing, and an [`expiry_pager`], which periodically sweeps
//! for TTL-expired items. Both dispatch a [`paging_visitor::PagingVisitor`] per
//! vBucket; the [`memory_watcher`] tracks bytes used against quota and wakes the
//! relevant pager.

pub mod bucket;
pub mod clock;
pub mod config;
pub mod errors;
pub mod executor;
pub mod expiry_pager;
pub mod histogram;
pub mod item;
pub mod item_pager;
pub mod logger;
pub mod memory_watcher;
pub mod paging_visitor;
pub mod utils;
pub mod vbucket;

pub use bucket::{Bucket, BucketStats, BucketStatsSnapshot, BucketType};
pub use clock::{Clock, EpochSecs, ManualClock, SharedClock, SystemClock};
pub use config::{BucketFullPolicy, CompressionMode, EvictionPolicy, PagerConfig};
pub use errors::PagerError;
pub use expiry_pager::{ExpiryPager, TickSummary};
pub use histogram::ItemEvictionHistogram;
pub use item::{DataTypeFlags, Item, ItemKey, XattrSegment};
pub use item_pager::{ItemPager, PagerState, RunSummary};
pub use memory_watcher::MemoryWatcher;
pub use paging_visitor::{PagerType, PagingVisitor, Phase, VisitOutcome};
pub use vbucket::{ItemAction, VBucket, VBucketId, VBucketState, VBucketStats, VBucketStatsSnapshot};

/// Initializes logging for the engine.
///
/// This should be called once before any other operations, typically by the
/// embedding host process. It sets up the logger via [`logger::init`].
/// # Errors
/// Returns an error if the logger cannot be initialized.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()?;
    Ok(())
}
