// =============================================================================
// Execution Ledger — upsert-by-id record store with per-provider aggregates
// =============================================================================
//
// The ledger is the ingestion side of the analytics core. Records arrive from
// the external signal pipeline and execution bridge, keyed by a stable signal
// id; re-ingesting an id replaces the prior version, which is how
// PENDING → CLOSED transitions land (no duplication, counts are by unique id).
//
// Locking: one RwLock per provider book, plus a brief outer lock on the
// provider index. Ingestion for one provider never blocks reads or writes for
// another; reads clone a consistent snapshot under the book's read lock.
//
// All derived statistics are recomputed from the record set on read — nothing
// here is a mutable source of truth besides the records themselves.
// =============================================================================

pub mod stats;
pub mod trends;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{SignalExecutionRecord, SignalOutcome, ValidationError};

pub use stats::{
    compute_format_stats, compute_platform_stats, compute_success_stats, max_drawdown,
    FormatStats, GradingConfig, PlatformStats, ProviderSuccessStats,
};
pub use trends::{daily_trends, DailyTrend};

const MS_PER_DAY: i64 = 86_400_000;

// -----------------------------------------------------------------------------
// Policies and query types
// -----------------------------------------------------------------------------

/// Optional memory bounds for long-running processes.
///
/// Eviction runs inside the same book write lock as the upsert and never
/// removes the record that was just written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep at most this many records per provider (oldest evicted first).
    #[serde(default)]
    pub max_records_per_provider: Option<usize>,
    /// Evict records whose `execution_time` is older than this many days.
    #[serde(default)]
    pub max_age_days: Option<u32>,
}

/// Predicate criteria for [`ExecutionLedger::filter_signals`]. All fields are
/// optional; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub provider_id: Option<String>,
    pub symbol: Option<String>,
    pub outcome: Option<SignalOutcome>,
    /// Inclusive lower bound on `execution_time` (ms epoch).
    pub from_ms: Option<i64>,
    /// Inclusive upper bound on `execution_time` (ms epoch).
    pub to_ms: Option<i64>,
}

/// One rejected item from a batch upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position in the submitted batch.
    pub index: usize,
    /// Record id as submitted (may be empty — that can be the rejection).
    pub id: String,
    pub error: ValidationError,
}

/// Result of a batch upsert: rejected items never abort the rest.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// Snapshot produced by [`ExecutionLedger::export`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsExport {
    pub provider_stats: Vec<ProviderSuccessStats>,
    pub signal_data: Vec<SignalExecutionRecord>,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub total_signals: usize,
    /// ISO 8601 timestamp of the export.
    pub export_date: String,
    pub export_id: String,
}

// -----------------------------------------------------------------------------
// Ledger
// -----------------------------------------------------------------------------

#[derive(Default)]
struct ProviderBook {
    /// Records keyed by signal id — the upsert key.
    records: HashMap<String, SignalExecutionRecord>,
}

/// In-memory execution ledger with per-provider locking.
pub struct ExecutionLedger {
    books: RwLock<HashMap<String, Arc<RwLock<ProviderBook>>>>,
    grading: GradingConfig,
    retention: RetentionPolicy,
}

impl Default for ExecutionLedger {
    fn default() -> Self {
        Self::new(GradingConfig::default(), RetentionPolicy::default())
    }
}

impl ExecutionLedger {
    pub fn new(grading: GradingConfig, retention: RetentionPolicy) -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            grading,
            retention,
        }
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Upsert a record by id. Replacing an existing id is the expected update
    /// path, not an error.
    pub fn upsert(&self, record: SignalExecutionRecord) -> Result<(), ValidationError> {
        record.validate()?;

        let book = self.book_for(&record.provider_id);
        let mut book = book.write();

        let id = record.id.clone();
        book.records.insert(id.clone(), record);
        self.apply_retention(&mut book, &id);
        Ok(())
    }

    /// Upsert each record in turn. A malformed item is recorded in the
    /// outcome and skipped; the remaining items still apply.
    pub fn upsert_batch(&self, records: Vec<SignalExecutionRecord>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, record) in records.into_iter().enumerate() {
            let id = record.id.clone();
            match self.upsert(record) {
                Ok(()) => outcome.accepted += 1,
                Err(error) => outcome.rejected.push(RejectedRecord { index, id, error }),
            }
        }
        if !outcome.rejected.is_empty() {
            debug!(
                accepted = outcome.accepted,
                rejected = outcome.rejected.len(),
                "batch upsert completed with rejections"
            );
        }
        outcome
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Snapshot of one provider's records, ordered by `execution_time`.
    /// `None` when the provider has never been seen (not an error).
    pub fn provider_records(&self, provider_id: &str) -> Option<Vec<SignalExecutionRecord>> {
        let book = self.books.read().get(provider_id).cloned()?;
        let book = book.read();
        if book.records.is_empty() {
            return None;
        }
        let mut records: Vec<_> = book.records.values().cloned().collect();
        records.sort_by(|a, b| a.execution_time.cmp(&b.execution_time).then(a.id.cmp(&b.id)));
        Some(records)
    }

    /// Aggregate success statistics for one provider; `None` when no records
    /// exist for it.
    pub fn success_stats(&self, provider_id: &str) -> Option<ProviderSuccessStats> {
        let records = self.provider_records(provider_id)?;
        Some(compute_success_stats(provider_id, &records, &self.grading))
    }

    /// Stats for every known provider, sorted descending by win rate.
    pub fn all_provider_stats(&self) -> Vec<ProviderSuccessStats> {
        let provider_ids: Vec<String> = self.books.read().keys().cloned().collect();

        let mut out: Vec<ProviderSuccessStats> = provider_ids
            .iter()
            .filter_map(|id| self.success_stats(id))
            .collect();
        out.sort_by(|a, b| {
            b.win_rate
                .partial_cmp(&a.win_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        out
    }

    /// Aggregates by `signal_format` across all providers.
    pub fn format_stats(&self) -> Vec<FormatStats> {
        compute_format_stats(&self.all_records())
    }

    /// Pure predicate filter; no mutation, results ordered by execution time.
    pub fn filter_signals(&self, criteria: &SignalFilter) -> Vec<SignalExecutionRecord> {
        let mut out: Vec<SignalExecutionRecord> = self
            .all_records()
            .into_iter()
            .filter(|r| {
                criteria
                    .provider_id
                    .as_ref()
                    .is_none_or(|p| &r.provider_id == p)
                    && criteria.symbol.as_ref().is_none_or(|s| &r.symbol == s)
                    && criteria
                        .outcome
                        .is_none_or(|o| r.status.outcome() == Some(o))
                    && criteria.from_ms.is_none_or(|t| r.execution_time >= t)
                    && criteria.to_ms.is_none_or(|t| r.execution_time <= t)
            })
            .collect();
        out.sort_by(|a, b| a.execution_time.cmp(&b.execution_time).then(a.id.cmp(&b.id)));
        out
    }

    /// Per-calendar-day win rate and pnl for a provider over the lookback
    /// window ending now.
    pub fn trends(&self, provider_id: &str, window_days: u32) -> Vec<DailyTrend> {
        self.trends_as_of(provider_id, window_days, Utc::now().timestamp_millis())
    }

    /// Deterministic variant of [`trends`] anchored at an explicit timestamp.
    ///
    /// [`trends`]: Self::trends
    pub fn trends_as_of(
        &self,
        provider_id: &str,
        window_days: u32,
        as_of_ms: i64,
    ) -> Vec<DailyTrend> {
        match self.provider_records(provider_id) {
            Some(records) => daily_trends(&records, window_days, as_of_ms),
            None => Vec::new(),
        }
    }

    /// Totals across all providers combined.
    pub fn platform_stats(&self) -> PlatformStats {
        let records = self.all_records();
        compute_platform_stats(self.provider_count(), &records)
    }

    /// Full analytics snapshot: per-provider stats, raw records, and export
    /// metadata.
    pub fn export(&self) -> AnalyticsExport {
        let signal_data = self.all_records();
        AnalyticsExport {
            provider_stats: self.all_provider_stats(),
            metadata: ExportMetadata {
                total_signals: signal_data.len(),
                export_date: Utc::now().to_rfc3339(),
                export_id: uuid::Uuid::new_v4().to_string(),
            },
            signal_data,
        }
    }

    /// Reset the in-memory index to empty. Durable snapshots are untouched.
    pub fn clear(&self) {
        self.books.write().clear();
    }

    /// Ids of providers with at least one record, sorted.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .books
            .read()
            .iter()
            .filter(|(_, b)| !b.read().records.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of providers with at least one record.
    pub fn provider_count(&self) -> usize {
        self.books
            .read()
            .values()
            .filter(|b| !b.read().records.is_empty())
            .count()
    }

    /// Total records across all providers (unique ids).
    pub fn total_records(&self) -> usize {
        self.books
            .read()
            .values()
            .map(|b| b.read().records.len())
            .sum()
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn book_for(&self, provider_id: &str) -> Arc<RwLock<ProviderBook>> {
        if let Some(book) = self.books.read().get(provider_id) {
            return book.clone();
        }
        self.books
            .write()
            .entry(provider_id.to_string())
            .or_default()
            .clone()
    }

    fn all_records(&self) -> Vec<SignalExecutionRecord> {
        let books: Vec<Arc<RwLock<ProviderBook>>> =
            self.books.read().values().cloned().collect();
        let mut out = Vec::new();
        for book in books {
            out.extend(book.read().records.values().cloned());
        }
        out
    }

    /// Enforce the retention policy on one book. `keep_id` is the id that was
    /// just upserted; it is never evicted.
    fn apply_retention(&self, book: &mut ProviderBook, keep_id: &str) {
        if let Some(max_age_days) = self.retention.max_age_days {
            let cutoff = Utc::now().timestamp_millis() - i64::from(max_age_days) * MS_PER_DAY;
            book.records
                .retain(|id, r| id == keep_id || r.execution_time >= cutoff);
        }

        if let Some(max_records) = self.retention.max_records_per_provider {
            while book.records.len() > max_records.max(1) {
                let oldest = book
                    .records
                    .iter()
                    .filter(|(id, _)| id.as_str() != keep_id)
                    .min_by_key(|(id, r)| (r.execution_time, id.clone()))
                    .map(|(id, _)| id.clone());
                match oldest {
                    Some(id) => {
                        book.records.remove(&id);
                    }
                    None => break,
                }
            }
        }
    }
}
