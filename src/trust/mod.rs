// =============================================================================
// Trust Score Engine — weighted multi-factor provider reliability scoring
// =============================================================================
//
// A trust score is a pure function of (provider id, record set, config): a
// weighted sum of per-provider metrics scaled to 0–100 and clamped. Weights
// are signed multipliers on the raw metrics — penalty factors (stop-loss
// rate, cancel rate) carry negative defaults heavy enough that an
// all-cancelled book scores below 50 and an all-pending book below 60.
//
// Providers below the sample-size gate always get the neutral fallback:
// score 50, grade C, INSUFFICIENT_DATA. The gate short-circuits everything
// else.
// =============================================================================

pub mod compare;

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{SignalExecutionRecord, SignalOutcome};

pub use compare::{comparative_analysis, provider_comparison, ComparativeAnalysis};

// -----------------------------------------------------------------------------
// Factors and weights
// -----------------------------------------------------------------------------

/// Factor names accepted in a weight map.
pub const FACTOR_TP_RATE: &str = "tp_rate";
pub const FACTOR_SL_RATE: &str = "sl_rate";
pub const FACTOR_AVG_DRAWDOWN: &str = "avg_drawdown";
pub const FACTOR_CANCEL_RATE: &str = "cancel_rate";
pub const FACTOR_LATENCY: &str = "latency";
pub const FACTOR_EXECUTION_RATE: &str = "execution_rate";
pub const FACTOR_CONFIDENCE: &str = "confidence";

/// Signed factor weights for the scoring engine.
///
/// Weights are not required to sum to 1; the final score is clamped to
/// [0, 100] for any combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustWeights {
    pub weights: HashMap<String, f64>,
}

impl Default for TrustWeights {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(FACTOR_TP_RATE.to_string(), 0.50);
        weights.insert(FACTOR_SL_RATE.to_string(), -0.20);
        weights.insert(FACTOR_CANCEL_RATE.to_string(), -1.00);
        weights.insert(FACTOR_EXECUTION_RATE.to_string(), 0.25);
        weights.insert(FACTOR_CONFIDENCE.to_string(), 0.15);
        weights.insert(FACTOR_LATENCY.to_string(), 0.10);
        weights.insert(FACTOR_AVG_DRAWDOWN.to_string(), 0.0);
        Self { weights }
    }
}

impl TrustWeights {
    /// Defaults with the given keys replaced. Unspecified factors keep their
    /// default weight.
    pub fn with_overrides(overrides: HashMap<String, f64>) -> Self {
        let mut base = Self::default();
        for (factor, weight) in overrides {
            base.weights.insert(factor, weight);
        }
        base
    }

    fn get(&self, factor: &str) -> f64 {
        self.weights.get(factor).copied().unwrap_or(0.0)
    }
}

fn default_min_sample_size() -> usize {
    10
}

fn default_latency_ceiling_ms() -> f64 {
    // 24 hours. Closes slower than this contribute nothing on the latency
    // factor.
    86_400_000.0
}

fn default_drawdown_norm() -> f64 {
    100.0
}

/// Full engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub weights: TrustWeights,

    /// Record count below which the neutral fallback applies.
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,

    /// Latency (ms) at which the inverse-normalized latency factor reaches 0.
    #[serde(default = "default_latency_ceiling_ms")]
    pub latency_ceiling_ms: f64,

    /// Loss magnitude (account units) mapping to an avg_drawdown metric of 1.
    #[serde(default = "default_drawdown_norm")]
    pub drawdown_norm: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            weights: TrustWeights::default(),
            min_sample_size: default_min_sample_size(),
            latency_ceiling_ms: default_latency_ceiling_ms(),
            drawdown_norm: default_drawdown_norm(),
        }
    }
}

// -----------------------------------------------------------------------------
// Result types
// -----------------------------------------------------------------------------

/// Letter grade derived from the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            Self::APlus
        } else if score >= 90.0 {
            Self::A
        } else if score >= 85.0 {
            Self::BPlus
        } else if score >= 80.0 {
            Self::B
        } else if score >= 75.0 {
            Self::CPlus
        } else if score >= 70.0 {
            Self::C
        } else if score >= 55.0 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        write!(f, "{s}")
    }
}

/// Coarse reliability bucket derived from the trust score, after the
/// sample-size gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReliabilityTier {
    InsufficientData,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ReliabilityTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Excellent
        } else if score >= 65.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Raw per-provider metrics feeding the weighted sum. All rates are
/// zero-division-safe fractions in [0, 1]; `latency` is a mean in
/// milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustMetrics {
    /// Fraction of closed signals that hit take-profit (WIN).
    pub tp_rate: f64,
    /// Fraction of closed signals that hit stop-loss (LOSS).
    pub sl_rate: f64,
    /// Fraction of all records cancelled.
    pub cancel_rate: f64,
    /// Fraction of all records not left pending.
    pub execution_rate: f64,
    /// Mean parser confidence over all records.
    pub confidence: f64,
    /// Normalized loss-magnitude penalty in [0, 1].
    pub avg_drawdown: f64,
    /// Mean close latency (close_time − execution_time) in ms over closed
    /// records; 0 when none are closed.
    pub latency: f64,
}

/// Weighted composite reliability measure for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScoreResult {
    pub provider_id: String,
    /// Clamped to [0, 100].
    pub trust_score: f64,
    pub grade: Grade,
    pub metrics: TrustMetrics,
    pub sample_size: usize,
    /// Millisecond epoch timestamp of this computation.
    pub last_updated: i64,
    pub reliability_tier: ReliabilityTier,
}

// -----------------------------------------------------------------------------
// Engine
// -----------------------------------------------------------------------------

/// The trust scoring engine. Stateless besides its configuration.
#[derive(Debug, Clone, Default)]
pub struct TrustScoreEngine {
    config: TrustConfig,
}

impl TrustScoreEngine {
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    /// Engine with default config except for the given weight overrides.
    pub fn with_weight_overrides(overrides: HashMap<String, f64>) -> Self {
        Self::new(TrustConfig {
            weights: TrustWeights::with_overrides(overrides),
            ..Default::default()
        })
    }

    /// Effective configuration: defaults merged with any overrides supplied
    /// at construction.
    pub fn configuration(&self) -> TrustConfig {
        self.config.clone()
    }

    /// Score one provider from its full record set.
    pub fn calculate(
        &self,
        provider_id: &str,
        records: &[SignalExecutionRecord],
    ) -> TrustScoreResult {
        let sample_size = records.len();
        let metrics = self.compute_metrics(records);

        // The sample-size gate is absolute: best-effort metrics are still
        // reported, but the score is pinned to neutral.
        if sample_size < self.config.min_sample_size {
            debug!(provider_id, sample_size, "below sample-size gate, neutral fallback");
            return TrustScoreResult {
                provider_id: provider_id.to_string(),
                trust_score: 50.0,
                grade: Grade::C,
                metrics,
                sample_size,
                last_updated: Utc::now().timestamp_millis(),
                reliability_tier: ReliabilityTier::InsufficientData,
            };
        }

        let w = &self.config.weights;
        let latency_factor =
            (1.0 - metrics.latency / self.config.latency_ceiling_ms).max(0.0);

        let weighted_sum = w.get(FACTOR_TP_RATE) * metrics.tp_rate
            + w.get(FACTOR_SL_RATE) * metrics.sl_rate
            + w.get(FACTOR_CANCEL_RATE) * metrics.cancel_rate
            + w.get(FACTOR_EXECUTION_RATE) * metrics.execution_rate
            + w.get(FACTOR_CONFIDENCE) * metrics.confidence
            + w.get(FACTOR_LATENCY) * latency_factor
            + w.get(FACTOR_AVG_DRAWDOWN) * metrics.avg_drawdown;

        let trust_score = (100.0 * weighted_sum).clamp(0.0, 100.0);

        TrustScoreResult {
            provider_id: provider_id.to_string(),
            trust_score,
            grade: Grade::from_score(trust_score),
            metrics,
            sample_size,
            last_updated: Utc::now().timestamp_millis(),
            reliability_tier: ReliabilityTier::from_score(trust_score),
        }
    }

    /// Score every provider in the map, sorted descending by trust score.
    pub fn score_many(
        &self,
        provider_records: &HashMap<String, Vec<SignalExecutionRecord>>,
    ) -> Vec<TrustScoreResult> {
        let mut results: Vec<TrustScoreResult> = provider_records
            .iter()
            .map(|(provider_id, records)| self.calculate(provider_id, records))
            .collect();
        results.sort_by(|a, b| {
            b.trust_score
                .partial_cmp(&a.trust_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        results
    }

    /// Recompute a provider's score from `records` as the full current set.
    ///
    /// `last_updated` always advances strictly past the previous result, even
    /// when the recompute lands on the same clock tick.
    pub fn update_score(
        &self,
        previous: &TrustScoreResult,
        records: &[SignalExecutionRecord],
    ) -> TrustScoreResult {
        let mut result = self.calculate(&previous.provider_id, records);
        if result.last_updated <= previous.last_updated {
            result.last_updated = previous.last_updated + 1;
        }
        result
    }

    /// Zero-division-safe metric fold over a record set.
    pub fn compute_metrics(&self, records: &[SignalExecutionRecord]) -> TrustMetrics {
        let total = records.len();
        if total == 0 {
            return TrustMetrics::default();
        }

        let closed: Vec<&SignalExecutionRecord> =
            records.iter().filter(|r| r.status.is_closed()).collect();
        let cancelled = records.iter().filter(|r| r.status.is_cancelled()).count();
        let executed = records.iter().filter(|r| !r.status.is_pending()).count();

        let (tp_rate, sl_rate) = if closed.is_empty() {
            (0.0, 0.0)
        } else {
            let wins = closed
                .iter()
                .filter(|r| r.status.outcome() == Some(SignalOutcome::Win))
                .count();
            let losses = closed
                .iter()
                .filter(|r| r.status.outcome() == Some(SignalOutcome::Loss))
                .count();
            (
                wins as f64 / closed.len() as f64,
                losses as f64 / closed.len() as f64,
            )
        };

        let confidence = records.iter().map(|r| r.confidence).sum::<f64>() / total as f64;

        let latencies: Vec<f64> = closed
            .iter()
            .filter_map(|r| {
                r.status
                    .close_time()
                    .map(|ct| (ct - r.execution_time) as f64)
            })
            .collect();
        let latency = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        let loss_magnitudes: Vec<f64> = closed
            .iter()
            .filter(|r| r.status.outcome() == Some(SignalOutcome::Loss))
            .filter_map(|r| r.status.pnl())
            .map(f64::abs)
            .collect();
        let avg_drawdown = if loss_magnitudes.is_empty() {
            0.0
        } else {
            let mean = loss_magnitudes.iter().sum::<f64>() / loss_magnitudes.len() as f64;
            (mean / self.config.drawdown_norm).clamp(0.0, 1.0)
        };

        TrustMetrics {
            tp_rate,
            sl_rate,
            cancel_rate: cancelled as f64 / total as f64,
            execution_rate: executed as f64 / total as f64,
            confidence,
            avg_drawdown,
            latency,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, SignalStatus};

    const HOUR_MS: i64 = 3_600_000;

    fn closed(
        id: &str,
        outcome: SignalOutcome,
        confidence: f64,
        latency_ms: i64,
    ) -> SignalExecutionRecord {
        let t = 1_700_000_000_000 + HOUR_MS;
        let mut r = SignalExecutionRecord::new(id, "p1", "XAUUSD", Direction::Buy, t);
        r.status = SignalStatus::Closed {
            outcome,
            exit_price: None,
            pnl: Some(if outcome == SignalOutcome::Loss { -25.0 } else { 50.0 }),
            close_time: t + latency_ms,
        };
        r.confidence = confidence;
        r
    }

    fn cancelled(id: &str, confidence: f64) -> SignalExecutionRecord {
        let mut r =
            SignalExecutionRecord::new(id, "p1", "XAUUSD", Direction::Buy, 1_700_000_000_000);
        r.status = SignalStatus::Cancelled;
        r.confidence = confidence;
        r
    }

    fn pending(id: &str, confidence: f64) -> SignalExecutionRecord {
        let mut r =
            SignalExecutionRecord::new(id, "p1", "XAUUSD", Direction::Buy, 1_700_000_000_000);
        r.confidence = confidence;
        r
    }

    fn wins_and_losses(wins: usize, losses: usize, conf: f64, lat: i64) -> Vec<SignalExecutionRecord> {
        let mut records = Vec::new();
        for i in 0..wins {
            records.push(closed(&format!("w{i}"), SignalOutcome::Win, conf, lat));
        }
        for i in 0..losses {
            records.push(closed(&format!("l{i}"), SignalOutcome::Loss, conf, lat));
        }
        records
    }

    #[test]
    fn scenario_a_good_provider() {
        // 7 WIN + 3 LOSS closed, confidence 0.9, one-hour closes.
        let engine = TrustScoreEngine::default();
        let records = wins_and_losses(7, 3, 0.9, HOUR_MS);

        let result = engine.calculate("p1", &records);
        assert!((result.metrics.tp_rate - 0.7).abs() < 1e-9);
        assert!((result.metrics.sl_rate - 0.3).abs() < 1e-9);
        assert!(result.trust_score > 70.0, "score was {}", result.trust_score);
        assert!(result.trust_score < 85.0, "score was {}", result.trust_score);
        assert_eq!(result.reliability_tier, ReliabilityTier::Good);
        assert_eq!(result.sample_size, 10);
    }

    #[test]
    fn scenario_b_heavy_cancellation_scores_poor() {
        // 6 CANCELLED + 4 WIN out of 10 total.
        let engine = TrustScoreEngine::default();
        let mut records = Vec::new();
        for i in 0..6 {
            records.push(cancelled(&format!("c{i}"), 0.8));
        }
        for i in 0..4 {
            records.push(closed(&format!("w{i}"), SignalOutcome::Win, 0.8, HOUR_MS));
        }

        let result = engine.calculate("p1", &records);
        assert!((result.metrics.cancel_rate - 0.6).abs() < 1e-9);
        assert!(result.trust_score < 50.0, "score was {}", result.trust_score);
        assert_eq!(result.reliability_tier, ReliabilityTier::Poor);
    }

    #[test]
    fn scenario_c_small_sample_neutral_fallback() {
        let engine = TrustScoreEngine::default();

        // 5 records, regardless of how good they look.
        let records = wins_and_losses(5, 0, 1.0, HOUR_MS);
        let result = engine.calculate("p1", &records);
        assert_eq!(result.trust_score, 50.0);
        assert_eq!(result.grade, Grade::C);
        assert_eq!(result.reliability_tier, ReliabilityTier::InsufficientData);
        assert_eq!(result.sample_size, 5);
        // Metrics are still reported best-effort.
        assert!((result.metrics.tp_rate - 1.0).abs() < 1e-9);

        // Zero records gate identically.
        let empty = engine.calculate("p2", &[]);
        assert_eq!(empty.trust_score, 50.0);
        assert_eq!(empty.reliability_tier, ReliabilityTier::InsufficientData);
        assert_eq!(empty.sample_size, 0);
    }

    #[test]
    fn all_cancelled_scores_below_fifty() {
        let engine = TrustScoreEngine::default();
        let records: Vec<_> = (0..12).map(|i| cancelled(&format!("c{i}"), 0.5)).collect();
        let result = engine.calculate("p1", &records);
        assert!(result.trust_score < 50.0, "score was {}", result.trust_score);
    }

    #[test]
    fn all_pending_scores_below_sixty() {
        let engine = TrustScoreEngine::default();
        let records: Vec<_> = (0..12).map(|i| pending(&format!("p{i}"), 0.5)).collect();
        let result = engine.calculate("p1", &records);
        assert!((result.metrics.execution_rate - 0.0).abs() < 1e-9);
        assert!(result.trust_score < 60.0, "score was {}", result.trust_score);
    }

    #[test]
    fn perfect_provider_reaches_one_hundred() {
        let engine = TrustScoreEngine::default();
        let records = wins_and_losses(20, 0, 1.0, 0);
        let result = engine.calculate("p1", &records);
        assert!((result.trust_score - 100.0).abs() < 1e-9);
        assert_eq!(result.grade, Grade::APlus);
        assert_eq!(result.reliability_tier, ReliabilityTier::Excellent);
    }

    #[test]
    fn monotonicity_better_provider_scores_higher() {
        let engine = TrustScoreEngine::default();
        let better = engine.calculate("good", &wins_and_losses(9, 3, 0.9, HOUR_MS));
        let worse = engine.calculate("bad", &wins_and_losses(6, 6, 0.6, 10 * HOUR_MS));
        assert!(better.trust_score > worse.trust_score);
    }

    #[test]
    fn arbitrary_weights_always_clamped() {
        let records = wins_and_losses(10, 0, 1.0, 0);

        let huge = TrustScoreEngine::with_weight_overrides(HashMap::from([(
            FACTOR_TP_RATE.to_string(),
            50.0,
        )]));
        assert_eq!(huge.calculate("p1", &records).trust_score, 100.0);

        let negative = TrustScoreEngine::with_weight_overrides(HashMap::from([
            (FACTOR_TP_RATE.to_string(), -10.0),
            (FACTOR_EXECUTION_RATE.to_string(), 0.0),
            (FACTOR_CONFIDENCE.to_string(), 0.0),
            (FACTOR_LATENCY.to_string(), 0.0),
        ]));
        assert_eq!(negative.calculate("p1", &records).trust_score, 0.0);
    }

    #[test]
    fn partial_weight_override_keeps_other_defaults() {
        let engine = TrustScoreEngine::with_weight_overrides(HashMap::from([(
            FACTOR_CANCEL_RATE.to_string(),
            -0.5,
        )]));
        let config = engine.configuration();
        assert_eq!(config.weights.get(FACTOR_CANCEL_RATE), -0.5);
        assert_eq!(config.weights.get(FACTOR_TP_RATE), 0.50);
        assert_eq!(config.min_sample_size, 10);
    }

    #[test]
    fn score_many_sorted_descending() {
        let engine = TrustScoreEngine::default();
        let map = HashMap::from([
            ("weak".to_string(), wins_and_losses(4, 8, 0.5, HOUR_MS)),
            ("strong".to_string(), wins_and_losses(10, 2, 0.9, HOUR_MS)),
            ("tiny".to_string(), wins_and_losses(2, 0, 0.9, HOUR_MS)),
        ]);

        let results = engine.score_many(&map);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].provider_id, "strong");
        assert!(results[0].trust_score >= results[1].trust_score);
        assert!(results[1].trust_score >= results[2].trust_score);
        // The under-sampled provider sits at the neutral 50.
        let tiny = results.iter().find(|r| r.provider_id == "tiny").unwrap();
        assert_eq!(tiny.trust_score, 50.0);
    }

    #[test]
    fn update_score_strictly_advances_last_updated() {
        let engine = TrustScoreEngine::default();
        let records = wins_and_losses(7, 3, 0.9, HOUR_MS);

        let mut previous = engine.calculate("p1", &records);
        // Force the previous timestamp into the future to simulate a
        // recompute within the same clock tick.
        previous.last_updated = Utc::now().timestamp_millis() + 60_000;

        let updated = engine.update_score(&previous, &records);
        assert!(updated.last_updated > previous.last_updated);

        // Normal case: consecutive updates also advance.
        let first = engine.calculate("p1", &records);
        let second = engine.update_score(&first, &records);
        assert!(second.last_updated > first.last_updated);
    }

    #[test]
    fn latency_mean_over_closed_records_only() {
        let engine = TrustScoreEngine::default();
        let mut records = wins_and_losses(2, 0, 0.9, 2 * HOUR_MS);
        records.push(pending("p0", 0.9));

        let metrics = engine.compute_metrics(&records);
        assert!((metrics.latency - 2.0 * HOUR_MS as f64).abs() < 1e-6);
        // No closed records at all: latency is 0, not NaN.
        let none = engine.compute_metrics(&[pending("a", 0.5)]);
        assert_eq!(none.latency, 0.0);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(97.0), Grade::APlus);
        assert_eq!(Grade::from_score(95.0), Grade::APlus);
        assert_eq!(Grade::from_score(91.0), Grade::A);
        assert_eq!(Grade::from_score(86.0), Grade::BPlus);
        assert_eq!(Grade::from_score(81.0), Grade::B);
        assert_eq!(Grade::from_score(76.0), Grade::CPlus);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(54.9), Grade::F);
        assert_eq!(Grade::APlus.to_string(), "A+");
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(ReliabilityTier::from_score(85.0), ReliabilityTier::Excellent);
        assert_eq!(ReliabilityTier::from_score(84.9), ReliabilityTier::Good);
        assert_eq!(ReliabilityTier::from_score(65.0), ReliabilityTier::Good);
        assert_eq!(ReliabilityTier::from_score(64.9), ReliabilityTier::Fair);
        assert_eq!(ReliabilityTier::from_score(50.0), ReliabilityTier::Fair);
        assert_eq!(ReliabilityTier::from_score(49.9), ReliabilityTier::Poor);
    }

    #[test]
    fn grade_serializes_as_letter() {
        let json = serde_json::to_string(&Grade::APlus).unwrap();
        assert_eq!(json, "\"A+\"");
        let tier = serde_json::to_string(&ReliabilityTier::InsufficientData).unwrap();
        assert_eq!(tier, "\"INSUFFICIENT_DATA\"");
    }
}
