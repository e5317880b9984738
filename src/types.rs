// =============================================================================
// Shared types used across the Trustlens analytics core
// =============================================================================
//
// A `SignalExecutionRecord` is one tracked lifecycle observation of a trading
// signal. Lifecycle-dependent fields (outcome, exit price, pnl, close time)
// live on the `SignalStatus::Closed` variant only, so aggregation code never
// has to ask whether a close-only field "is defined" on a pending record.
// =============================================================================

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trade direction of the originating signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Final outcome of a closed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalOutcome {
    Win,
    Loss,
    Breakeven,
}

/// Lifecycle state of a signal, tagged so that only the fields valid for the
/// current state exist.
///
/// Serialized with an internal `status` tag, so a closed record reads as
/// `{"status": "CLOSED", "outcome": "WIN", "close_time": ..., ...}` on the
/// wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    /// Received but not yet placed on a trading account.
    Pending,
    /// Live on a trading account, not yet resolved.
    Executed,
    /// Resolved with a final outcome.
    Closed {
        outcome: SignalOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_price: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pnl: Option<f64>,
        /// Millisecond epoch timestamp of the close.
        close_time: i64,
    },
    /// Withdrawn before execution (by the provider or by risk rules).
    Cancelled,
}

impl SignalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Outcome of a closed signal; `None` for every other state.
    pub fn outcome(&self) -> Option<SignalOutcome> {
        match self {
            Self::Closed { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }

    /// Realized pnl, when the signal is closed and the bridge reported one.
    pub fn pnl(&self) -> Option<f64> {
        match self {
            Self::Closed { pnl, .. } => *pnl,
            _ => None,
        }
    }

    /// Close timestamp (ms epoch) for closed signals.
    pub fn close_time(&self) -> Option<i64> {
        match self {
            Self::Closed { close_time, .. } => Some(*close_time),
            _ => None,
        }
    }
}

/// One observation of a signal's lifecycle, as produced by the external
/// ingestion pipeline and execution bridge.
///
/// `id` is the upsert key: re-ingesting a record with an existing id replaces
/// the prior version, which is how PENDING → CLOSED transitions arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExecutionRecord {
    pub id: String,
    pub provider_id: String,
    #[serde(default)]
    pub provider_name: String,
    /// Canonical symbol (post-normalization).
    pub symbol: String,
    pub direction: Direction,
    #[serde(default)]
    pub entry_price: f64,
    #[serde(default)]
    pub stop_loss: f64,
    #[serde(default)]
    pub take_profit: f64,
    #[serde(default)]
    pub lot_size: f64,
    #[serde(flatten)]
    pub status: SignalStatus,
    /// Reward-to-risk ratio recorded for the signal, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reward_ratio: Option<f64>,
    /// Millisecond epoch timestamp of signal execution/receipt.
    pub execution_time: i64,
    /// Parser confidence in [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// Free-form tag describing the source message format.
    #[serde(default)]
    pub signal_format: String,
    /// Opaque key/value bag carried through untouched.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl SignalExecutionRecord {
    /// Minimal record with neutral numeric fields. Callers fill in the rest.
    pub fn new(
        id: impl Into<String>,
        provider_id: impl Into<String>,
        symbol: impl Into<String>,
        direction: Direction,
        execution_time: i64,
    ) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            provider_name: String::new(),
            symbol: symbol.into(),
            direction,
            entry_price: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            lot_size: 0.0,
            status: SignalStatus::Pending,
            risk_reward_ratio: None,
            execution_time,
            confidence: 0.0,
            signal_format: String::new(),
            metadata: HashMap::new(),
        }
    }

    /// Check the fields required at the ingestion boundary.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingId);
        }
        if self.provider_id.trim().is_empty() {
            return Err(ValidationError::MissingProviderId {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Rejection reason for a record that fails boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is missing a signal id")]
    MissingId,
    #[error("record '{id}' is missing a provider id")]
    MissingProviderId { id: String },
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_record_serializes_with_status_tag() {
        let mut rec = SignalExecutionRecord::new("s1", "p1", "XAUUSD", Direction::Buy, 1_000);
        rec.status = SignalStatus::Closed {
            outcome: SignalOutcome::Win,
            exit_price: Some(2410.5),
            pnl: Some(120.0),
            close_time: 2_000,
        };

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "CLOSED");
        assert_eq!(json["outcome"], "WIN");
        assert_eq!(json["close_time"], 2_000);
        assert_eq!(json["direction"], "BUY");
    }

    #[test]
    fn pending_record_has_no_close_fields() {
        let rec = SignalExecutionRecord::new("s1", "p1", "EURUSD", Direction::Sell, 1_000);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("outcome").is_none());
        assert!(json.get("close_time").is_none());
    }

    #[test]
    fn roundtrip_closed_record() {
        let mut rec = SignalExecutionRecord::new("s2", "p1", "XAUUSD", Direction::Buy, 1_000);
        rec.status = SignalStatus::Closed {
            outcome: SignalOutcome::Loss,
            exit_price: None,
            pnl: Some(-40.0),
            close_time: 5_000,
        };
        rec.risk_reward_ratio = Some(1.8);

        let json = serde_json::to_string(&rec).unwrap();
        let back: SignalExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn validate_rejects_missing_ids() {
        let rec = SignalExecutionRecord::new("", "p1", "XAUUSD", Direction::Buy, 0);
        assert_eq!(rec.validate(), Err(ValidationError::MissingId));

        let rec = SignalExecutionRecord::new("s1", "  ", "XAUUSD", Direction::Buy, 0);
        assert!(matches!(
            rec.validate(),
            Err(ValidationError::MissingProviderId { .. })
        ));

        let rec = SignalExecutionRecord::new("s1", "p1", "XAUUSD", Direction::Buy, 0);
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn status_accessors() {
        let closed = SignalStatus::Closed {
            outcome: SignalOutcome::Breakeven,
            exit_price: None,
            pnl: None,
            close_time: 10,
        };
        assert!(closed.is_closed());
        assert_eq!(closed.outcome(), Some(SignalOutcome::Breakeven));
        assert_eq!(closed.close_time(), Some(10));
        assert_eq!(closed.pnl(), None);

        assert!(SignalStatus::Pending.is_pending());
        assert!(SignalStatus::Cancelled.is_cancelled());
        assert_eq!(SignalStatus::Executed.outcome(), None);
    }
}
