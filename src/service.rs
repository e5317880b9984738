// =============================================================================
// Trust Service — the wired analytics core
// =============================================================================
//
// The single entry point consumers hold: normalizer → ledger → trust engine,
// tied together behind one explicitly constructed object (no module-level
// singletons). Created once at process start and passed by reference.
//
// Trust scores are memoized through a TTL cache with single-flight misses.
// Durable ledger snapshots, when enabled, run fire-and-forget on a background
// thread: a failed or slow store write never blocks or fails ingestion.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::AnalyticsConfig;
use crate::kv_store::{InMemoryStore, KeyValueStore};
use crate::ledger::{
    AnalyticsExport, BatchOutcome, DailyTrend, ExecutionLedger, FormatStats, PlatformStats,
    ProviderSuccessStats, SignalFilter,
};
use crate::symbol_normalizer::SymbolNormalizer;
use crate::trust::{
    comparative_analysis, ComparativeAnalysis, TrustScoreEngine, TrustScoreResult,
};
use crate::types::{SignalExecutionRecord, ValidationError};

/// Store key under which the ledger snapshot blob is persisted.
const SNAPSHOT_KEY: &str = "ledger_snapshot";

/// Facade over the analytics core.
pub struct TrustService {
    normalizer: RwLock<SymbolNormalizer>,
    ledger: Arc<ExecutionLedger>,
    engine: TrustScoreEngine,
    score_cache: TtlCache<TrustScoreResult>,
    snapshot_store: Option<Arc<dyn KeyValueStore>>,
    snapshot_every: Option<usize>,
    ingest_count: AtomicUsize,
}

impl TrustService {
    /// Service with in-memory persistence and no durable snapshots.
    pub fn new(config: AnalyticsConfig) -> Self {
        Self::with_stores(config, Arc::new(InMemoryStore::new()), None)
    }

    /// Service with an explicit override store and an optional snapshot
    /// store.
    pub fn with_stores(
        config: AnalyticsConfig,
        override_store: Arc<dyn KeyValueStore>,
        snapshot_store: Option<Arc<dyn KeyValueStore>>,
    ) -> Self {
        let normalizer = SymbolNormalizer::new(config.normalizer.clone(), override_store);
        let ledger = Arc::new(ExecutionLedger::new(
            config.grading.clone(),
            config.retention.clone(),
        ));
        let engine = TrustScoreEngine::new(config.trust.clone());
        let score_cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs));

        info!(
            min_sample_size = config.trust.min_sample_size,
            snapshots = snapshot_store.is_some(),
            "trust service initialised"
        );

        // A zero cadence cannot trigger anything; treat it as disabled so a
        // bad config value degrades instead of breaking ingestion.
        let snapshot_every = match config.snapshot_every {
            Some(0) => {
                warn!("snapshot_every = 0 in config, snapshotting disabled");
                None
            }
            other => other,
        };

        Self {
            normalizer: RwLock::new(normalizer),
            ledger,
            engine,
            score_cache,
            snapshot_store,
            snapshot_every,
            ingest_count: AtomicUsize::new(0),
        }
    }

    // ── Ingestion ───────────────────────────────────────────────────────

    /// Normalize the record's symbol and upsert it into the ledger.
    pub fn ingest(&self, mut record: SignalExecutionRecord) -> Result<(), ValidationError> {
        record.symbol = self.normalizer.read().normalize(&record.symbol);
        let provider_id = record.provider_id.clone();
        self.ledger.upsert(record)?;

        self.score_cache.invalidate(&provider_id);
        self.after_ingest(1);
        Ok(())
    }

    /// Batch variant of [`ingest`]; a rejected item never aborts the rest.
    ///
    /// [`ingest`]: Self::ingest
    pub fn ingest_batch(&self, records: Vec<SignalExecutionRecord>) -> BatchOutcome {
        let records: Vec<SignalExecutionRecord> = {
            let normalizer = self.normalizer.read();
            records
                .into_iter()
                .map(|mut r| {
                    r.symbol = normalizer.normalize(&r.symbol);
                    r
                })
                .collect()
        };

        let providers: Vec<String> = records.iter().map(|r| r.provider_id.clone()).collect();
        let outcome = self.ledger.upsert_batch(records);

        for provider_id in providers {
            self.score_cache.invalidate(&provider_id);
        }
        self.after_ingest(outcome.accepted);
        outcome
    }

    // ── Read queries (presentation layer) ───────────────────────────────

    pub fn stats(&self, provider_id: &str) -> Option<ProviderSuccessStats> {
        self.ledger.success_stats(provider_id)
    }

    pub fn all_stats(&self) -> Vec<ProviderSuccessStats> {
        self.ledger.all_provider_stats()
    }

    pub fn format_stats(&self) -> Vec<FormatStats> {
        self.ledger.format_stats()
    }

    pub fn filter_signals(&self, criteria: &SignalFilter) -> Vec<SignalExecutionRecord> {
        self.ledger.filter_signals(criteria)
    }

    pub fn trends(&self, provider_id: &str, window_days: u32) -> Vec<DailyTrend> {
        self.ledger.trends(provider_id, window_days)
    }

    pub fn platform_stats(&self) -> PlatformStats {
        self.ledger.platform_stats()
    }

    pub fn export(&self) -> AnalyticsExport {
        self.ledger.export()
    }

    // ── Trust scoring (allocation layer) ────────────────────────────────

    /// Memoized trust score for one provider. Concurrent cold calls for the
    /// same provider trigger one computation.
    pub fn trust_score(&self, provider_id: &str) -> TrustScoreResult {
        self.score_cache.get_or_compute(provider_id, || {
            let records = self
                .ledger
                .provider_records(provider_id)
                .unwrap_or_default();
            self.engine.calculate(provider_id, &records)
        })
    }

    /// Fresh scores for every known provider, ranked descending.
    pub fn trust_scores(&self) -> Vec<TrustScoreResult> {
        let mut provider_records = HashMap::new();
        for provider_id in self.ledger.provider_ids() {
            if let Some(records) = self.ledger.provider_records(&provider_id) {
                provider_records.insert(provider_id, records);
            }
        }
        self.engine.score_many(&provider_records)
    }

    pub fn compare(&self, results: &[TrustScoreResult]) -> ComparativeAnalysis {
        comparative_analysis(results)
    }

    pub fn engine(&self) -> &TrustScoreEngine {
        &self.engine
    }

    // ── Symbol overrides ────────────────────────────────────────────────

    pub fn normalize_symbol(&self, raw: &str) -> String {
        self.normalizer.read().normalize(raw)
    }

    pub fn add_symbol_override(&self, alias: &str, canonical: &str) {
        self.normalizer.write().add_override(alias, canonical);
    }

    pub fn remove_symbol_override(&self, alias: &str) {
        self.normalizer.write().remove_override(alias);
    }

    pub fn symbol_aliases(&self, canonical: &str) -> Vec<String> {
        self.normalizer.read().aliases_for(canonical)
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    /// Write a ledger snapshot to the snapshot store synchronously.
    ///
    /// Failures are logged and reported as `false`; they never propagate.
    pub fn snapshot_now(&self) -> bool {
        let Some(store) = &self.snapshot_store else {
            return false;
        };
        write_snapshot(&self.ledger, store)
    }

    /// Restore records from a persisted snapshot, if one exists.
    ///
    /// A missing or malformed blob is logged and treated as an empty
    /// snapshot; initialization never fails on bad persisted data.
    pub fn restore_snapshot(&self) -> usize {
        let Some(store) = &self.snapshot_store else {
            return 0;
        };

        let blob = match store.get(SNAPSHOT_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return 0,
            Err(e) => {
                warn!(error = %e, "snapshot read failed, continuing in memory");
                return 0;
            }
        };

        match serde_json::from_str::<AnalyticsExport>(&blob) {
            Ok(export) => {
                let outcome = self.ledger.upsert_batch(export.signal_data);
                info!(restored = outcome.accepted, "ledger snapshot restored");
                outcome.accepted
            }
            Err(e) => {
                warn!(error = %e, "snapshot blob malformed, starting empty");
                0
            }
        }
    }

    /// Reset the in-memory ledger and caches. Durable snapshots are left
    /// untouched.
    pub fn clear(&self) {
        self.ledger.clear();
        self.score_cache.clear();
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Count accepted ingests and kick a background snapshot when the
    /// configured cadence is crossed.
    fn after_ingest(&self, accepted: usize) {
        if accepted == 0 {
            return;
        }
        let (Some(every), Some(store)) = (self.snapshot_every, &self.snapshot_store) else {
            self.ingest_count.fetch_add(accepted, Ordering::Relaxed);
            return;
        };

        let before = self.ingest_count.fetch_add(accepted, Ordering::Relaxed);
        let after = before + accepted;
        if after / every > before / every {
            let ledger = Arc::clone(&self.ledger);
            let store = Arc::clone(store);
            // Fire-and-forget: ingestion never waits on the store.
            std::thread::spawn(move || {
                write_snapshot(&ledger, &store);
            });
        }
    }
}

fn write_snapshot(ledger: &ExecutionLedger, store: &Arc<dyn KeyValueStore>) -> bool {
    let export = ledger.export();
    let blob = match serde_json::to_string(&export) {
        Ok(blob) => blob,
        Err(e) => {
            warn!(error = %e, "failed to serialise ledger snapshot");
            return false;
        }
    };
    match store.set(SNAPSHOT_KEY, &blob) {
        Ok(()) => {
            debug!(
                total_signals = export.metadata.total_signals,
                "ledger snapshot written"
            );
            true
        }
        Err(e) => {
            warn!(error = %e, "ledger snapshot write failed, continuing in memory");
            false
        }
    }
}
