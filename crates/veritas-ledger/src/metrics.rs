//! System metrics derived from ledger state.

use crate::ledger::LedgerView;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Grief weight is not yet derived from ledger content.
const GRIEF_WEIGHT: f64 = 0.7;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LedgerMetrics {
    pub judicial_restoration_score: f64,
    pub fairness_index: f64,
    pub grief_weight: f64,
    pub contradiction_rate: f64,
    pub emotional_sovereignty_index: f64,
    pub last_updated: DateTime<Utc>,
}

impl LedgerMetrics {
    /// `resolved` is the number of contradictions whose protocols completed.
    pub async fn calculate(view: &LedgerView, resolved: usize) -> Self {
        let logs = view.log_len().await;
        let contradictions = view.contradiction_len().await;
        Self::from_counts(logs, contradictions, resolved)
    }

    pub fn from_counts(logs: usize, contradictions: usize, resolved: usize) -> Self {
        let contradiction_rate = if logs > 0 {
            contradictions as f64 / logs as f64
        } else {
            0.0
        };
        let resolution_efficiency = if contradictions > 0 {
            resolved.min(contradictions) as f64 / contradictions as f64
        } else {
            1.0
        };
        Self {
            judicial_restoration_score: (0.98 - contradiction_rate * 0.1).max(0.0),
            fairness_index: (0.95 - contradiction_rate * 0.05).max(0.0),
            grief_weight: GRIEF_WEIGHT,
            contradiction_rate,
            emotional_sovereignty_index: (0.92 * resolution_efficiency).max(0.0),
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ledger_is_pristine() {
        let m = LedgerMetrics::from_counts(0, 0, 0);
        assert_eq!(m.contradiction_rate, 0.0);
        assert!((m.judicial_restoration_score - 0.98).abs() < 1e-9);
        assert!((m.fairness_index - 0.95).abs() < 1e-9);
        assert!((m.emotional_sovereignty_index - 0.92).abs() < 1e-9);
    }

    #[test]
    fn unresolved_contradictions_drag_sovereignty() {
        let m = LedgerMetrics::from_counts(10, 4, 1);
        assert!((m.contradiction_rate - 0.4).abs() < 1e-9);
        assert!((m.judicial_restoration_score - 0.94).abs() < 1e-9);
        assert!((m.emotional_sovereignty_index - 0.23).abs() < 1e-9);
    }

    #[test]
    fn resolved_never_exceeds_total() {
        let m = LedgerMetrics::from_counts(2, 1, 5);
        assert!((m.emotional_sovereignty_index - 0.92).abs() < 1e-9);
    }
}
