// =============================================================================
// Derived provider statistics — recomputed from the record set on every read
// =============================================================================
//
// Nothing in this module is stored as source of truth. Stats are a pure fold
// over a provider's records; two consecutive reads with no intervening
// ingestion produce identical results.
//
// Every rate guards its denominator: an empty or all-pending record set
// yields 0, never NaN.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{SignalExecutionRecord, SignalOutcome};

// -----------------------------------------------------------------------------
// Grading configuration
// -----------------------------------------------------------------------------

fn default_a_min_win_rate() -> f64 {
    75.0
}

fn default_a_min_avg_rr() -> f64 {
    1.5
}

fn default_a_min_execution_rate() -> f64 {
    0.8
}

fn default_b_min_win_rate() -> f64 {
    60.0
}

fn default_b_min_avg_rr() -> f64 {
    1.0
}

fn default_c_min_win_rate() -> f64 {
    45.0
}

fn default_d_min_win_rate() -> f64 {
    30.0
}

/// Thresholds for the rule-based performance grade.
///
/// Buckets are checked top-down: a provider earns 'A' only when win rate,
/// average RR, and execution rate all clear the A-thresholds; 'B' requires
/// the B win-rate and RR floors; 'C' and 'D' gate on win rate alone; anything
/// below the D floor (an all-loss book included) grades 'F'.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_a_min_win_rate")]
    pub a_min_win_rate: f64,
    #[serde(default = "default_a_min_avg_rr")]
    pub a_min_avg_rr: f64,
    #[serde(default = "default_a_min_execution_rate")]
    pub a_min_execution_rate: f64,
    #[serde(default = "default_b_min_win_rate")]
    pub b_min_win_rate: f64,
    #[serde(default = "default_b_min_avg_rr")]
    pub b_min_avg_rr: f64,
    #[serde(default = "default_c_min_win_rate")]
    pub c_min_win_rate: f64,
    #[serde(default = "default_d_min_win_rate")]
    pub d_min_win_rate: f64,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            a_min_win_rate: default_a_min_win_rate(),
            a_min_avg_rr: default_a_min_avg_rr(),
            a_min_execution_rate: default_a_min_execution_rate(),
            b_min_win_rate: default_b_min_win_rate(),
            b_min_avg_rr: default_b_min_avg_rr(),
            c_min_win_rate: default_c_min_win_rate(),
            d_min_win_rate: default_d_min_win_rate(),
        }
    }
}

impl GradingConfig {
    /// Bucket (win_rate %, average RR, execution rate fraction) into a grade.
    pub fn grade(&self, win_rate: f64, average_rr: f64, execution_rate: f64) -> char {
        if win_rate >= self.a_min_win_rate
            && average_rr >= self.a_min_avg_rr
            && execution_rate >= self.a_min_execution_rate
        {
            'A'
        } else if win_rate >= self.b_min_win_rate && average_rr >= self.b_min_avg_rr {
            'B'
        } else if win_rate >= self.c_min_win_rate {
            'C'
        } else if win_rate >= self.d_min_win_rate {
            'D'
        } else {
            'F'
        }
    }
}

// -----------------------------------------------------------------------------
// Derived stats types
// -----------------------------------------------------------------------------

/// Aggregate success statistics for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSuccessStats {
    pub provider_id: String,
    pub provider_name: String,
    pub total_signals: usize,
    /// Signals no longer PENDING.
    pub executed_signals: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub breakeven_count: usize,
    /// Percentage in [0, 100]; 0 when nothing has executed.
    pub win_rate: f64,
    /// Mean over defined risk/reward ratios only; 0 when none are defined.
    pub average_rr: f64,
    pub best_rr: f64,
    pub worst_rr: f64,
    /// Peak-to-trough decline of the cumulative pnl series.
    pub max_drawdown: f64,
    pub total_pnl: f64,
    pub performance_grade: char,
}

/// Per-signal-format aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatStats {
    pub format: String,
    pub total_signals: usize,
    /// Percentage of closed signals in this format that won.
    pub success_rate: f64,
}

/// Totals across all providers combined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_providers: usize,
    pub total_signals: usize,
    /// Percentage in [0, 100] over all executed signals.
    pub overall_win_rate: f64,
    pub total_pnl: f64,
    pub average_rr: f64,
}

// -----------------------------------------------------------------------------
// Computation
// -----------------------------------------------------------------------------

/// Fold a provider's record set into [`ProviderSuccessStats`].
pub fn compute_success_stats(
    provider_id: &str,
    records: &[SignalExecutionRecord],
    grading: &GradingConfig,
) -> ProviderSuccessStats {
    let total_signals = records.len();
    let executed_signals = records.iter().filter(|r| !r.status.is_pending()).count();

    let mut win_count = 0;
    let mut loss_count = 0;
    let mut breakeven_count = 0;
    for r in records {
        match r.status.outcome() {
            Some(SignalOutcome::Win) => win_count += 1,
            Some(SignalOutcome::Loss) => loss_count += 1,
            Some(SignalOutcome::Breakeven) => breakeven_count += 1,
            None => {}
        }
    }

    let win_rate = if executed_signals > 0 {
        100.0 * win_count as f64 / executed_signals as f64
    } else {
        0.0
    };

    let rr_values: Vec<f64> = records.iter().filter_map(|r| r.risk_reward_ratio).collect();
    let average_rr = mean(&rr_values);
    let best_rr = rr_values.iter().cloned().fold(0.0_f64, f64::max);
    let worst_rr = if rr_values.is_empty() {
        0.0
    } else {
        rr_values.iter().cloned().fold(f64::INFINITY, f64::min)
    };

    let max_drawdown = max_drawdown(records);
    let total_pnl: f64 = records.iter().filter_map(|r| r.status.pnl()).sum();

    let execution_rate = if total_signals > 0 {
        executed_signals as f64 / total_signals as f64
    } else {
        0.0
    };

    let provider_name = records
        .iter()
        .map(|r| r.provider_name.as_str())
        .find(|n| !n.is_empty())
        .unwrap_or(provider_id)
        .to_string();

    ProviderSuccessStats {
        provider_id: provider_id.to_string(),
        provider_name,
        total_signals,
        executed_signals,
        win_count,
        loss_count,
        breakeven_count,
        win_rate,
        average_rr,
        best_rr,
        worst_rr,
        max_drawdown,
        total_pnl,
        performance_grade: grading.grade(win_rate, average_rr, execution_rate),
    }
}

/// Peak-to-trough decline of the cumulative pnl series ordered by
/// `execution_time`. Records without a realized pnl contribute nothing.
pub fn max_drawdown(records: &[SignalExecutionRecord]) -> f64 {
    let mut with_pnl: Vec<(i64, f64)> = records
        .iter()
        .filter_map(|r| r.status.pnl().map(|pnl| (r.execution_time, pnl)))
        .collect();
    with_pnl.sort_by_key(|(t, _)| *t);

    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut drawdown = 0.0_f64;
    for (_, pnl) in with_pnl {
        cumulative += pnl;
        peak = peak.max(cumulative);
        drawdown = drawdown.max(peak - cumulative);
    }
    drawdown
}

/// Aggregate records by `signal_format`, sorted by volume descending.
pub fn compute_format_stats(records: &[SignalExecutionRecord]) -> Vec<FormatStats> {
    use std::collections::HashMap;

    struct Bucket {
        total: usize,
        closed: usize,
        wins: usize,
    }

    let mut buckets: HashMap<&str, Bucket> = HashMap::new();
    for r in records {
        let bucket = buckets.entry(r.signal_format.as_str()).or_insert(Bucket {
            total: 0,
            closed: 0,
            wins: 0,
        });
        bucket.total += 1;
        if r.status.is_closed() {
            bucket.closed += 1;
            if r.status.outcome() == Some(SignalOutcome::Win) {
                bucket.wins += 1;
            }
        }
    }

    let mut out: Vec<FormatStats> = buckets
        .into_iter()
        .map(|(format, b)| FormatStats {
            format: format.to_string(),
            total_signals: b.total,
            success_rate: if b.closed > 0 {
                100.0 * b.wins as f64 / b.closed as f64
            } else {
                0.0
            },
        })
        .collect();
    out.sort_by(|a, b| b.total_signals.cmp(&a.total_signals).then(a.format.cmp(&b.format)));
    out
}

/// Totals across all providers.
pub fn compute_platform_stats(
    provider_count: usize,
    records: &[SignalExecutionRecord],
) -> PlatformStats {
    let total_signals = records.len();
    let executed = records.iter().filter(|r| !r.status.is_pending()).count();
    let wins = records
        .iter()
        .filter(|r| r.status.outcome() == Some(SignalOutcome::Win))
        .count();

    let overall_win_rate = if executed > 0 {
        100.0 * wins as f64 / executed as f64
    } else {
        0.0
    };

    let total_pnl: f64 = records.iter().filter_map(|r| r.status.pnl()).sum();
    let rr_values: Vec<f64> = records.iter().filter_map(|r| r.risk_reward_ratio).collect();

    PlatformStats {
        total_providers: provider_count,
        total_signals,
        overall_win_rate,
        total_pnl,
        average_rr: mean(&rr_values),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
