use thiserror::Error;

/// Crate-wide error type. Mirrors the teacher's flat `DbError` enum: one variant
/// per failure family, each with a single `#[error("...")]` message, surfaced at
/// every public API boundary as `Result<T, PagerError>`.
///
/// Per-item failures (`NotEvictable` in spec terms: dirty, pinned, a replica on an
/// ephemeral bucket, already non-resident) are deliberately *not* variants here —
/// per the spec's error-handling design they are local to a visit, silently skipped,
/// and folded into visit statistics rather than bubbled as an `Err`.
#[derive(Debug, Error)]
pub enum PagerError {
    #[error("no such vbucket: {0}")]
    NoSuchVBucket(u16),

    #[error("vbucket {0} disappeared mid-visit")]
    VBucketGone(u16),

    #[error("invalid watermarks: mem_low_wat ({low}) must be < mem_high_wat ({high}) < max_size ({max})")]
    InvalidWatermarks { low: u64, high: u64, max: u64 },

    #[error("bucket is full: {used} bytes used, {max_size} byte quota")]
    BucketFull { used: u64, max_size: u64 },

    #[error("invalid configuration: {0}")]
    ConfigError(String),
}
