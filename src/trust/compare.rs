// =============================================================================
// Comparative Analyzer — rankings, distribution, recommendations
// =============================================================================
//
// Consumes a set of TrustScoreResult values and summarizes them for the
// allocation layer. `average_score` excludes INSUFFICIENT_DATA entries so a
// fleet of unscored providers cannot drag the average to 50; best and worst
// performers are taken over the full input list, so the summary never hides a
// provider that was part of the comparison.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ReliabilityTier, TrustScoreResult};

/// Summary of a provider comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparativeAnalysis {
    /// Mean trust score over results with enough data; 0 when none qualify.
    pub average_score: f64,
    pub best_performer: Option<TrustScoreResult>,
    pub worst_performer: Option<TrustScoreResult>,
    /// Count of providers per letter grade.
    pub score_distribution: BTreeMap<String, usize>,
    pub recommendations: Vec<String>,
}

/// Rank and summarize a set of trust score results.
pub fn comparative_analysis(results: &[TrustScoreResult]) -> ComparativeAnalysis {
    let scored: Vec<&TrustScoreResult> = results
        .iter()
        .filter(|r| r.reliability_tier != ReliabilityTier::InsufficientData)
        .collect();

    let average_score = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|r| r.trust_score).sum::<f64>() / scored.len() as f64
    };

    let best_performer = results
        .iter()
        .max_by(|a, b| {
            a.trust_score
                .partial_cmp(&b.trust_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();
    let worst_performer = results
        .iter()
        .min_by(|a, b| {
            a.trust_score
                .partial_cmp(&b.trust_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned();

    let mut score_distribution = BTreeMap::new();
    for r in results {
        *score_distribution.entry(r.grade.to_string()).or_insert(0) += 1;
    }

    let mut recommendations = Vec::new();
    if let Some(best) = &best_performer {
        recommendations.push(format!(
            "Consider prioritizing signals from provider {} (trust score {:.1})",
            best.provider_id, best.trust_score
        ));
    }

    let poor_count = results
        .iter()
        .filter(|r| r.reliability_tier == ReliabilityTier::Poor)
        .count();
    if poor_count > 0 {
        recommendations.push(format!(
            "Reduce allocation to {poor_count} underperforming provider(s) with POOR reliability"
        ));
    }

    let insufficient_count = results.len() - scored.len();
    if insufficient_count > 0 {
        recommendations.push(format!(
            "{insufficient_count} provider(s) need more signal history before scoring is meaningful"
        ));
    }

    ComparativeAnalysis {
        average_score,
        best_performer,
        worst_performer,
        score_distribution,
        recommendations,
    }
}

/// Convenience wrapper over [`comparative_analysis`] for callers that want
/// the comparison fields in one shot.
pub fn provider_comparison(results: &[TrustScoreResult]) -> ComparativeAnalysis {
    comparative_analysis(results)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{Grade, TrustMetrics};

    fn result(provider_id: &str, score: f64, tier: ReliabilityTier) -> TrustScoreResult {
        TrustScoreResult {
            provider_id: provider_id.to_string(),
            trust_score: score,
            grade: Grade::from_score(score),
            metrics: TrustMetrics::default(),
            sample_size: 20,
            last_updated: 1_700_000_000_000,
            reliability_tier: tier,
        }
    }

    #[test]
    fn average_excludes_insufficient_data() {
        let results = vec![
            result("a", 90.0, ReliabilityTier::Excellent),
            result("b", 30.0, ReliabilityTier::Poor),
            result("c", 50.0, ReliabilityTier::InsufficientData),
        ];
        let analysis = comparative_analysis(&results);
        assert!((analysis.average_score - 60.0).abs() < 1e-9);
    }

    #[test]
    fn best_and_worst_over_full_list() {
        // An INSUFFICIENT_DATA provider at 50 can still be the worst when
        // everyone else scores higher: min/max never hide inputs.
        let results = vec![
            result("a", 90.0, ReliabilityTier::Excellent),
            result("b", 70.0, ReliabilityTier::Good),
            result("c", 50.0, ReliabilityTier::InsufficientData),
        ];
        let analysis = comparative_analysis(&results);
        assert_eq!(analysis.best_performer.unwrap().provider_id, "a");
        assert_eq!(analysis.worst_performer.unwrap().provider_id, "c");
    }

    #[test]
    fn recommendations_name_best_and_count_poor() {
        let results = vec![
            result("alpha", 92.0, ReliabilityTier::Excellent),
            result("beta", 40.0, ReliabilityTier::Poor),
            result("gamma", 35.0, ReliabilityTier::Poor),
        ];
        let analysis = comparative_analysis(&results);

        assert!(analysis.recommendations[0].contains("prioritizing signals from provider alpha"));
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("2 underperforming provider(s)")));
    }

    #[test]
    fn no_poor_providers_no_reduction_line() {
        let results = vec![result("a", 88.0, ReliabilityTier::Excellent)];
        let analysis = comparative_analysis(&results);
        assert!(!analysis
            .recommendations
            .iter()
            .any(|r| r.contains("underperforming")));
    }

    #[test]
    fn score_distribution_counts_grades() {
        let results = vec![
            result("a", 96.0, ReliabilityTier::Excellent),
            result("b", 91.0, ReliabilityTier::Excellent),
            result("c", 91.5, ReliabilityTier::Excellent),
            result("d", 40.0, ReliabilityTier::Poor),
        ];
        let analysis = comparative_analysis(&results);
        assert_eq!(analysis.score_distribution.get("A+"), Some(&1));
        assert_eq!(analysis.score_distribution.get("A"), Some(&2));
        assert_eq!(analysis.score_distribution.get("F"), Some(&1));
    }

    #[test]
    fn empty_input_is_benign() {
        let analysis = comparative_analysis(&[]);
        assert_eq!(analysis.average_score, 0.0);
        assert!(analysis.best_performer.is_none());
        assert!(analysis.worst_performer.is_none());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn wrapper_matches_analysis() {
        let results = vec![
            result("a", 80.0, ReliabilityTier::Good),
            result("b", 60.0, ReliabilityTier::Fair),
        ];
        let a = comparative_analysis(&results);
        let b = provider_comparison(&results);
        assert_eq!(a.average_score, b.average_score);
        assert_eq!(
            a.best_performer.unwrap().provider_id,
            b.best_performer.unwrap().provider_id
        );
    }
}
