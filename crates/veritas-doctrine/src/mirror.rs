//! Mirror Clause — the sole arbiter of doctrinal consistency.
//!
//! `enforce` is pure: same outcome, same snapshot, same result. `check` runs
//! `enforce` and records what it found in the ledger:
//!
//!   Consistent    → ledger.write("Mirror Clause: ... consistent ...")
//!   Contradiction → ledger.log_contradiction(record)
//!
//! A contradiction is a normal return value. Errors are reserved for the
//! ledger refusing a contradiction write.

use crate::library::DoctrineSnapshot;
use crate::invariant::Verdict;
use serde_json::json;
use tracing::{debug, warn};
use veritas_core::{Contradiction, ContradictionCategory, Outcome, Protocol, Result};
use veritas_ledger::{ContradictionEntry, LogEntry, MemoryLedger};

#[derive(Clone, Debug, PartialEq)]
pub enum ClauseResult {
    Consistent,
    Contradiction(Contradiction),
}

impl ClauseResult {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }
}

/// What `check` left in the ledger.
#[derive(Clone, Debug)]
pub enum ClauseRecord {
    /// The pass line, or `None` if the best-effort write was refused.
    Consistent(Option<LogEntry>),
    Contradiction(ContradictionEntry),
}

impl ClauseRecord {
    pub fn contradiction(&self) -> Option<&ContradictionEntry> {
        match self {
            Self::Contradiction(entry) => Some(entry),
            Self::Consistent(_) => None,
        }
    }
}

/// Protocol the clause suggests when an invariant does not name its own.
pub fn recommend(category: ContradictionCategory) -> Option<Protocol> {
    match category {
        ContradictionCategory::Logical | ContradictionCategory::Doctrinal => {
            Some(Protocol::ReflectionSession)
        }
        _ => None,
    }
}

/// Evaluate `outcome` against every invariant in `doctrine`, in order,
/// stopping at the first failure.
pub fn enforce(outcome: &Outcome, doctrine: &DoctrineSnapshot) -> ClauseResult {
    for invariant in doctrine.invariants() {
        if let Verdict::Violated {
            summary,
            severity,
            detail,
        } = invariant.evaluate(outcome, doctrine)
        {
            let category = invariant.category();
            let mut contradiction =
                Contradiction::new(outcome.agent.clone(), invariant.id(), category, summary)
                    .with_severity(severity)
                    .with_refs(outcome.doctrinal_refs.clone())
                    .with_detail(json!({
                        "case_id": outcome.case_id,
                        "doctrine_version": doctrine.version(),
                        "finding": detail,
                    }));
            if let Some(protocol) = invariant.recommendation().or_else(|| recommend(category)) {
                contradiction = contradiction.with_recommendation(protocol);
            }
            return ClauseResult::Contradiction(contradiction);
        }
    }
    ClauseResult::Consistent
}

/// Enforce and record. Runs exactly one ledger append.
pub async fn check(
    outcome: &Outcome,
    doctrine: &DoctrineSnapshot,
    ledger: &MemoryLedger,
) -> Result<ClauseRecord> {
    match enforce(outcome, doctrine) {
        ClauseResult::Consistent => {
            let line = format!(
                "Mirror Clause: {} outcome for case {} consistent with doctrine v{}",
                outcome.agent,
                outcome.case_id,
                doctrine.version()
            );
            match ledger.write(line).await {
                Ok(entry) => {
                    debug!(agent = %outcome.agent, "mirror clause passed");
                    Ok(ClauseRecord::Consistent(Some(entry)))
                }
                Err(e) => {
                    warn!(agent = %outcome.agent, error = %e, "mirror clause pass not recorded");
                    Ok(ClauseRecord::Consistent(None))
                }
            }
        }
        ClauseResult::Contradiction(contradiction) => {
            let entry = ledger.log_contradiction(contradiction).await?;
            Ok(ClauseRecord::Contradiction(entry))
        }
    }
}
