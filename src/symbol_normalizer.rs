// =============================================================================
// Symbol Normalizer — raw ticker aliases to canonical symbols
// =============================================================================
//
// Signal providers write the same instrument a dozen ways ("GOLD", "Gold",
// "XAU"). Records must enter the ledger under one canonical symbol or the
// per-symbol aggregates fragment. The normalizer is a lookup table: built-in
// aliases for the common CFD/forex instruments, plus a user override table
// persisted through the injected `KeyValueStore`.
//
// Unknown aliases either pass through unchanged or map to the empty string,
// controlled by `fallback_to_input`.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kv_store::KeyValueStore;

/// Store key under which the user override table is persisted.
const OVERRIDES_KEY: &str = "symbol_overrides";

/// Built-in alias → canonical mappings for common instruments.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("GOLD", "XAUUSD"),
    ("XAU", "XAUUSD"),
    ("SILVER", "XAGUSD"),
    ("XAG", "XAGUSD"),
    ("OIL", "XTIUSD"),
    ("USOIL", "XTIUSD"),
    ("WTI", "XTIUSD"),
    ("NASDAQ", "NAS100"),
    ("USTEC", "NAS100"),
    ("NDX", "NAS100"),
    ("DOW", "US30"),
    ("DJI", "US30"),
    ("SPX", "US500"),
    ("SP500", "US500"),
    ("DAX", "GER40"),
    ("GER30", "GER40"),
    ("BTC", "BTCUSD"),
    ("BITCOIN", "BTCUSD"),
    ("ETH", "ETHUSD"),
    ("ETHEREUM", "ETHUSD"),
];

fn default_true() -> bool {
    true
}

/// Behaviour switches for the normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Match aliases case-insensitively (uppercase folding).
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    /// When an alias is unknown: `true` returns the input unchanged,
    /// `false` returns an empty string.
    #[serde(default = "default_true")]
    pub fallback_to_input: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            fallback_to_input: true,
        }
    }
}

/// Alias → canonical symbol resolver with a persisted user override table.
pub struct SymbolNormalizer {
    config: NormalizerConfig,
    /// Built-in aliases, keys pre-folded per `config.case_insensitive`.
    aliases: HashMap<String, String>,
    /// User overrides, consulted before the built-in table.
    overrides: HashMap<String, String>,
    store: Arc<dyn KeyValueStore>,
}

impl SymbolNormalizer {
    /// Build a normalizer, loading any persisted overrides from `store`.
    ///
    /// A malformed persisted override blob is logged and discarded; the
    /// normalizer always comes up with the built-in table intact.
    pub fn new(config: NormalizerConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let mut aliases = HashMap::new();
        for (alias, canonical) in DEFAULT_ALIASES {
            aliases.insert(fold(alias, config.case_insensitive), canonical.to_string());
        }
        // Canonical names resolve to themselves, so an already-normalized
        // symbol survives a second pass even with fallback_to_input = false.
        for (_, canonical) in DEFAULT_ALIASES {
            aliases.insert(fold(canonical, config.case_insensitive), canonical.to_string());
        }

        let overrides = match store.get(OVERRIDES_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<HashMap<String, String>>(&blob) {
                Ok(map) => map
                    .into_iter()
                    .map(|(k, v)| (fold(&k, config.case_insensitive), v))
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "persisted symbol overrides malformed, using defaults");
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "failed to read symbol overrides, using defaults");
                HashMap::new()
            }
        };

        Self {
            config,
            aliases,
            overrides,
            store,
        }
    }

    /// Resolve a raw ticker to its canonical symbol.
    pub fn normalize(&self, raw: &str) -> String {
        let key = fold(raw.trim(), self.config.case_insensitive);

        if let Some(canonical) = self.overrides.get(&key) {
            return canonical.clone();
        }
        if let Some(canonical) = self.aliases.get(&key) {
            return canonical.clone();
        }

        if self.config.fallback_to_input {
            raw.trim().to_string()
        } else {
            String::new()
        }
    }

    /// Add (or replace) a user override and persist the table.
    ///
    /// A store failure is logged and the in-memory override still applies.
    pub fn add_override(&mut self, alias: &str, canonical: &str) {
        let key = fold(alias.trim(), self.config.case_insensitive);
        self.overrides.insert(key, canonical.trim().to_string());
        self.persist_overrides();
    }

    /// Remove a user override and persist the table.
    pub fn remove_override(&mut self, alias: &str) {
        let key = fold(alias.trim(), self.config.case_insensitive);
        if self.overrides.remove(&key).is_some() {
            self.persist_overrides();
        }
    }

    /// Reverse lookup: every known alias (built-in and override) that maps to
    /// `canonical`. Sorted for stable output.
    pub fn aliases_for(&self, canonical: &str) -> Vec<String> {
        let target = canonical.trim();
        let mut out: Vec<String> = self
            .overrides
            .iter()
            .chain(self.aliases.iter())
            .filter(|(alias, c)| c.as_str() == target && alias.as_str() != target)
            .map(|(alias, _)| alias.clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Export the user override table as a JSON config blob.
    pub fn export_overrides(&self) -> String {
        serde_json::to_string_pretty(&self.overrides).unwrap_or_else(|_| "{}".to_string())
    }

    /// Import a config blob produced by [`export_overrides`], merging it over
    /// the current overrides. Returns the number of entries imported.
    ///
    /// [`export_overrides`]: Self::export_overrides
    pub fn import_overrides(&mut self, blob: &str) -> Result<usize> {
        let map: HashMap<String, String> =
            serde_json::from_str(blob).context("failed to parse symbol override blob")?;

        let count = map.len();
        for (alias, canonical) in map {
            let key = fold(&alias, self.config.case_insensitive);
            self.overrides.insert(key, canonical);
        }
        self.persist_overrides();
        debug!(count, "symbol overrides imported");
        Ok(count)
    }

    /// Number of active user overrides.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    fn persist_overrides(&self) {
        let blob = match serde_json::to_string(&self.overrides) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialise symbol overrides");
                return;
            }
        };
        if let Err(e) = self.store.set(OVERRIDES_KEY, &blob) {
            warn!(error = %e, "failed to persist symbol overrides");
        }
    }
}

fn fold(s: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        s.to_uppercase()
    } else {
        s.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::InMemoryStore;

    fn normalizer(config: NormalizerConfig) -> SymbolNormalizer {
        SymbolNormalizer::new(config, Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn gold_normalizes_any_case() {
        let n = normalizer(NormalizerConfig::default());
        assert_eq!(n.normalize("GOLD"), "XAUUSD");
        assert_eq!(n.normalize("gold"), "XAUUSD");
        assert_eq!(n.normalize("Gold"), "XAUUSD");
        assert_eq!(n.normalize("  gold  "), "XAUUSD");
    }

    #[test]
    fn unknown_symbol_passthrough_on() {
        let n = normalizer(NormalizerConfig::default());
        assert_eq!(n.normalize("FOO123"), "FOO123");
    }

    #[test]
    fn unknown_symbol_empty_when_fallback_off() {
        let n = normalizer(NormalizerConfig {
            fallback_to_input: false,
            ..Default::default()
        });
        assert_eq!(n.normalize("FOO123"), "");
        // Canonical names still resolve to themselves.
        assert_eq!(n.normalize("XAUUSD"), "XAUUSD");
    }

    #[test]
    fn case_sensitive_mode() {
        let n = normalizer(NormalizerConfig {
            case_insensitive: false,
            fallback_to_input: true,
        });
        assert_eq!(n.normalize("GOLD"), "XAUUSD");
        // Lowercase no longer matches; falls through to input.
        assert_eq!(n.normalize("gold"), "gold");
    }

    #[test]
    fn override_beats_builtin_and_persists() {
        let store = Arc::new(InMemoryStore::new());
        {
            let mut n = SymbolNormalizer::new(NormalizerConfig::default(), store.clone());
            n.add_override("GOLD", "GOLDMICRO");
            assert_eq!(n.normalize("gold"), "GOLDMICRO");
        }

        // Fresh instance over the same store picks the override back up.
        let n = SymbolNormalizer::new(NormalizerConfig::default(), store);
        assert_eq!(n.normalize("GOLD"), "GOLDMICRO");
    }

    #[test]
    fn remove_override_restores_builtin() {
        let mut n = normalizer(NormalizerConfig::default());
        n.add_override("GOLD", "GOLDMICRO");
        n.remove_override("gold");
        assert_eq!(n.normalize("GOLD"), "XAUUSD");
        assert_eq!(n.override_count(), 0);
    }

    #[test]
    fn reverse_lookup_collects_aliases() {
        let mut n = normalizer(NormalizerConfig::default());
        n.add_override("GLD", "XAUUSD");

        let aliases = n.aliases_for("XAUUSD");
        assert!(aliases.contains(&"GOLD".to_string()));
        assert!(aliases.contains(&"XAU".to_string()));
        assert!(aliases.contains(&"GLD".to_string()));
        // The canonical name itself is not listed as an alias.
        assert!(!aliases.contains(&"XAUUSD".to_string()));
    }

    #[test]
    fn export_import_roundtrip() {
        let mut a = normalizer(NormalizerConfig::default());
        a.add_override("US100", "NAS100");
        a.add_override("GLD", "XAUUSD");
        let blob = a.export_overrides();

        let mut b = normalizer(NormalizerConfig::default());
        let imported = b.import_overrides(&blob).unwrap();
        assert_eq!(imported, 2);
        assert_eq!(b.normalize("us100"), "NAS100");
        assert_eq!(b.normalize("GLD"), "XAUUSD");
    }

    #[test]
    fn malformed_import_is_an_error() {
        let mut n = normalizer(NormalizerConfig::default());
        assert!(n.import_overrides("{broken").is_err());
    }

    #[test]
    fn malformed_persisted_blob_falls_back_to_defaults() {
        let store = Arc::new(InMemoryStore::new());
        store.set(OVERRIDES_KEY, "not valid json").unwrap();

        let n = SymbolNormalizer::new(NormalizerConfig::default(), store);
        assert_eq!(n.override_count(), 0);
        assert_eq!(n.normalize("GOLD"), "XAUUSD");
    }
}
