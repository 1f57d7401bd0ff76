//! Runtime configuration surface (§10.3).
//!
//! Mirrors the teacher's runtime feature-flag registry in spirit (a plain struct
//! with validated setters, `Serialize`/`Deserialize` via `serde`), but purpose-built
//! for the options §6 enumerates rather than a generic flag map. This crate never
//! parses a config file itself — that's the excluded "configuration plumbing"
//! collaborator — callers load a `PagerConfig` however they like and hand it over.

use crate::errors::PagerError;
use serde::{Deserialize, Serialize};

/// §6 "ht_eviction_policy ∈ {2-bit_lru, hifi_mfu}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    TwoBitLru,
    HifiMfu,
}

/// §6 "compression_mode ∈ {off, passive, active}".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    Off,
    Passive,
    Active,
}

/// §6 "Bucket type + full policy".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketFullPolicy {
    PersistentValueOnly,
    PersistentFullEviction,
    EphemeralAutoDelete,
    EphemeralFailNewData,
}

/// The full set of recognised configuration options (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagerConfig {
    pub max_size: u64,
    pub mem_low_wat: u64,
    pub mem_high_wat: u64,
    pub ht_eviction_policy: EvictionPolicy,
    pub bucket_full_policy: BucketFullPolicy,
    /// §4.1/§6 `item_eviction_age_percentage` (0..100).
    pub item_eviction_age_percentage: u8,
    /// §4.1/§6 `item_eviction_freq_counter_age_threshold` (0..100), despite the name
    /// this is a *frequency* percentile cap, kept verbatim per §6's naming.
    pub item_eviction_freq_counter_age_threshold: u8,
    pub compression_mode: CompressionMode,
    /// §4.4 ExpiryPager sweep period, in seconds.
    pub expiry_pager_period_secs: u32,
    /// §4.4 jitter applied to the period, in seconds (0 disables jitter).
    pub expiry_pager_jitter_secs: u32,
    /// §9(b) Open Question decision: fixed 2% headroom reclaimed past the low
    /// watermark so a visitor doesn't stop exactly on the line.
    pub low_watermark_slack: f64,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            max_size: 1 << 30,
            mem_low_wat: (1 << 30) * 3 / 4,
            mem_high_wat: (1 << 30) * 85 / 100,
            ht_eviction_policy: EvictionPolicy::TwoBitLru,
            bucket_full_policy: BucketFullPolicy::PersistentValueOnly,
            item_eviction_age_percentage: 30,
            item_eviction_freq_counter_age_threshold: 30,
            compression_mode: CompressionMode::Off,
            expiry_pager_period_secs: 3600,
            expiry_pager_jitter_secs: 60,
            low_watermark_slack: LOW_WATERMARK_SLACK,
        }
    }
}

/// §9(b): "a fixed 2% headroom is reasonable."
pub const LOW_WATERMARK_SLACK: f64 = 0.02;

impl PagerConfig {
    /// # Errors
    /// Returns `PagerError::InvalidWatermarks` unless
    /// `mem_low_wat < mem_high_wat < max_size`.
    pub fn validate(&self) -> Result<(), PagerError> {
        if self.mem_low_wat < self.mem_high_wat && self.mem_high_wat < self.max_size {
            Ok(())
        } else {
            Err(PagerError::InvalidWatermarks { low: self.mem_low_wat, high: self.mem_high_wat, max: self.max_size })
        }
    }

    /// Sets the quota and watermarks together, validating before committing so the
    /// config never transiently holds an invalid combination.
    ///
    /// # Errors
    /// Returns `PagerError::InvalidWatermarks` if the new values violate
    /// `mem_low_wat < mem_high_wat < max_size`.
    pub fn set_watermarks(&mut self, max_size: u64, mem_low_wat: u64, mem_high_wat: u64) -> Result<(), PagerError> {
        if !(mem_low_wat < mem_high_wat && mem_high_wat < max_size) {
            return Err(PagerError::InvalidWatermarks { low: mem_low_wat, high: mem_high_wat, max: max_size });
        }
        self.max_size = max_size;
        self.mem_low_wat = mem_low_wat;
        self.mem_high_wat = mem_high_wat;
        Ok(())
    }

    /// §4.3 "policy change handling": returns whether `policy` differs from the
    /// currently configured one, for callers that need to know whether to trigger
    /// `PagerError`-free phase re-initialisation on the `ItemPager`.
    #[must_use]
    pub fn policy_changed(&self, policy: EvictionPolicy) -> bool {
        self.ht_eviction_policy != policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PagerConfig::default().validate().is_ok());
    }

    #[test]
    fn set_watermarks_rejects_bad_ordering() {
        let mut cfg = PagerConfig::default();
        let before = cfg.clone();
        assert!(cfg.set_watermarks(100, 80, 50).is_err());
        assert_eq!(cfg, before);
    }

    #[test]
    fn set_watermarks_accepts_valid_ordering() {
        let mut cfg = PagerConfig::default();
        cfg.set_watermarks(300, 100, 200).unwrap();
        assert_eq!((cfg.max_size, cfg.mem_low_wat, cfg.mem_high_wat), (300, 100, 200));
    }

    #[test]
    fn policy_changed_detects_difference() {
        let cfg = PagerConfig::default();
        assert!(!cfg.policy_changed(EvictionPolicy::TwoBitLru));
        assert!(cfg.policy_changed(EvictionPolicy::HifiMfu));
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = PagerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PagerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
