// =============================================================================
// Trustlens — provider trust analytics for trading-signal automation
// =============================================================================
//
// A pure computation/aggregation library: execution outcomes stream in from
// an external signal pipeline and trade bridge, and trust scores, rankings,
// and recommendations come out. No transport, no persistence engine, no UI —
// those are collaborators behind the `KeyValueStore` seam and the
// `TrustService` facade.
//
// Data flows one direction:
//   SymbolNormalizer → ExecutionLedger → TrustScoreEngine ⇄ ComparativeAnalyzer
// =============================================================================

pub mod cache;
pub mod config;
pub mod kv_store;
pub mod ledger;
pub mod service;
pub mod symbol_normalizer;
pub mod trust;
pub mod types;

pub use config::AnalyticsConfig;
pub use kv_store::{FileStore, InMemoryStore, KeyValueStore};
pub use ledger::{
    AnalyticsExport, BatchOutcome, DailyTrend, ExecutionLedger, FormatStats, GradingConfig,
    PlatformStats, ProviderSuccessStats, RetentionPolicy, SignalFilter,
};
pub use service::TrustService;
pub use symbol_normalizer::{NormalizerConfig, SymbolNormalizer};
pub use trust::{
    comparative_analysis, provider_comparison, ComparativeAnalysis, Grade, ReliabilityTier,
    TrustConfig, TrustMetrics, TrustScoreEngine, TrustScoreResult, TrustWeights,
};
pub use types::{
    Direction, SignalExecutionRecord, SignalOutcome, SignalStatus, ValidationError,
};
