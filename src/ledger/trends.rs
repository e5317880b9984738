// =============================================================================
// Daily trend buckets — per-calendar-day win rate and pnl
// =============================================================================

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::{SignalExecutionRecord, SignalOutcome};

const MS_PER_DAY: i64 = 86_400_000;

/// One calendar day of provider activity inside the lookback window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    /// Percentage in [0, 100] over the day's closed signals; 0 when none.
    pub win_rate: f64,
    pub pnl: f64,
}

/// Group records by the UTC calendar date of `execution_time`, keeping only
/// days within `window_days` of `as_of_ms`. Sorted ascending by date.
pub fn daily_trends(
    records: &[SignalExecutionRecord],
    window_days: u32,
    as_of_ms: i64,
) -> Vec<DailyTrend> {
    use std::collections::BTreeMap;

    let cutoff = as_of_ms - i64::from(window_days) * MS_PER_DAY;

    struct Day {
        closed: usize,
        wins: usize,
        pnl: f64,
    }

    let mut days: BTreeMap<NaiveDate, Day> = BTreeMap::new();
    for r in records {
        if r.execution_time < cutoff || r.execution_time > as_of_ms {
            continue;
        }
        let Some(ts) = DateTime::from_timestamp_millis(r.execution_time) else {
            continue;
        };
        let day = days.entry(ts.date_naive()).or_insert(Day {
            closed: 0,
            wins: 0,
            pnl: 0.0,
        });
        if r.status.is_closed() {
            day.closed += 1;
            if r.status.outcome() == Some(SignalOutcome::Win) {
                day.wins += 1;
            }
        }
        day.pnl += r.status.pnl().unwrap_or(0.0);
    }

    days.into_iter()
        .map(|(date, d)| DailyTrend {
            date,
            win_rate: if d.closed > 0 {
                100.0 * d.wins as f64 / d.closed as f64
            } else {
                0.0
            },
            pnl: d.pnl,
        })
        .collect()
}
