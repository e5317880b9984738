// =============================================================================
// Analytics Configuration
// =============================================================================
//
// One struct gathers every knob the analytics core exposes: normalizer
// switches, grading thresholds, trust weights, retention bounds, cache TTL,
// and snapshot cadence. Operators tune a JSON file instead of recompiling.
//
// Saves go through a `.tmp` sibling and a rename, and every field has a
// serde default, so a file written by an older build (or cut short by a
// crash) still loads.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::{GradingConfig, RetentionPolicy};
use crate::symbol_normalizer::NormalizerConfig;
use crate::trust::TrustConfig;

fn default_cache_ttl_secs() -> u64 {
    30
}

/// Top-level configuration for the analytics core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Symbol normalizer behaviour.
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Performance grade thresholds for ledger stats.
    #[serde(default)]
    pub grading: GradingConfig,

    /// Trust score weights, sample-size gate, latency ceiling.
    #[serde(default)]
    pub trust: TrustConfig,

    /// Optional per-provider memory bounds.
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Lifetime of memoized trust scores, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Write a durable ledger snapshot after every N accepted ingests.
    /// `None` disables snapshotting.
    #[serde(default)]
    pub snapshot_every: Option<usize>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerConfig::default(),
            grading: GradingConfig::default(),
            trust: TrustConfig::default(),
            retention: RetentionPolicy::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            snapshot_every: None,
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read analytics config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse analytics config from {}", path.display()))?;

        info!(
            path = %path.display(),
            min_sample_size = config.trust.min_sample_size,
            cache_ttl_secs = config.cache_ttl_secs,
            "analytics config loaded"
        );

        Ok(config)
    }

    /// Persist the configuration to `path` using an atomic write (write to
    /// `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise analytics config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "analytics config saved (atomic)");
        Ok(())
    }
}
