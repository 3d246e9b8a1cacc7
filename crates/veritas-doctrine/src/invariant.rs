//! Doctrinal invariants — the predicates outcomes must satisfy.
//!
//! An invariant sees the outcome and the doctrine snapshot and nothing else,
//! so evaluation is a pure function of those two values.

use crate::library::DoctrineSnapshot;
use serde_json::json;
use std::sync::Arc;
use veritas_core::{ContradictionCategory, Outcome, Protocol, Severity};

/// Ceiling on the spread of sentencing modifiers within one case.
pub const DISPROPORTIONALITY_CEILING: f64 = 0.35;

/// Grief score above which a closure sequence is owed.
pub const GRIEF_CLOSURE_THRESHOLD: f64 = 0.6;

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Holds,
    Violated {
        summary: String,
        severity: Severity,
        detail: serde_json::Value,
    },
}

impl Verdict {
    pub fn violated(summary: impl Into<String>, severity: Severity) -> Self {
        Self::Violated {
            summary: summary.into(),
            severity,
            detail: serde_json::Value::Null,
        }
    }

    pub fn violated_with(summary: impl Into<String>, severity: Severity, detail: serde_json::Value) -> Self {
        Self::Violated {
            summary: summary.into(),
            severity,
            detail,
        }
    }

    pub fn holds(&self) -> bool {
        matches!(self, Self::Holds)
    }
}

/// A single doctrinal invariant.
pub trait Invariant: Send + Sync {
    /// Stable identifier, recorded on every contradiction it raises.
    fn id(&self) -> &str;

    fn category(&self) -> ContradictionCategory;

    /// Protocol this invariant asks for when it fails, if any.
    fn recommendation(&self) -> Option<Protocol> {
        None
    }

    fn evaluate(&self, outcome: &Outcome, doctrine: &DoctrineSnapshot) -> Verdict;
}

type Predicate = dyn Fn(&Outcome, &DoctrineSnapshot) -> Verdict + Send + Sync;

/// Invariant built from a closure.
pub struct FnInvariant {
    id: String,
    category: ContradictionCategory,
    recommendation: Option<Protocol>,
    predicate: Box<Predicate>,
}

impl FnInvariant {
    pub fn new(
        id: impl Into<String>,
        category: ContradictionCategory,
        predicate: impl Fn(&Outcome, &DoctrineSnapshot) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            recommendation: None,
            predicate: Box::new(predicate),
        }
    }

    pub fn recommending(mut self, protocol: Protocol) -> Self {
        self.recommendation = Some(protocol);
        self
    }

    pub fn shared(self) -> Arc<dyn Invariant> {
        Arc::new(self)
    }
}

impl Invariant for FnInvariant {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> ContradictionCategory {
        self.category
    }

    fn recommendation(&self) -> Option<Protocol> {
        self.recommendation
    }

    fn evaluate(&self, outcome: &Outcome, doctrine: &DoctrineSnapshot) -> Verdict {
        (self.predicate)(outcome, doctrine)
    }
}

/// Built-in invariants, in evaluation order.
pub fn default_invariants() -> Vec<Arc<dyn Invariant>> {
    vec![
        FnInvariant::new("summary-present", ContradictionCategory::Logical, |outcome, _| {
            if outcome.summary.trim().is_empty() {
                Verdict::violated(format!("{} produced an empty finding", outcome.agent), Severity::Low)
            } else {
                Verdict::Holds
            }
        })
        .shared(),
        FnInvariant::new("active-books-only", ContradictionCategory::Doctrinal, |outcome, doctrine| {
            let inactive: Vec<u32> = outcome
                .doctrinal_refs
                .iter()
                .copied()
                .filter(|id| !doctrine.is_active(*id))
                .collect();
            if inactive.is_empty() {
                Verdict::Holds
            } else {
                Verdict::violated_with(
                    format!("Outcome cites books outside active doctrine: {:?}", inactive),
                    Severity::Medium,
                    json!({ "inactive_books": inactive, "doctrine_version": doctrine.version() }),
                )
            }
        })
        .shared(),
        FnInvariant::new("proportionality", ContradictionCategory::Bias, |outcome, _| {
            match outcome.payload_f64("disproportionality") {
                Some(score) if score > DISPROPORTIONALITY_CEILING => Verdict::violated_with(
                    format!(
                        "Disproportionate modifiers in case {}: spread {:.2} exceeds {:.2}",
                        outcome.case_id, score, DISPROPORTIONALITY_CEILING
                    ),
                    if score > 2.0 * DISPROPORTIONALITY_CEILING {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    json!({ "disproportionality": score, "ceiling": DISPROPORTIONALITY_CEILING }),
                ),
                _ => Verdict::Holds,
            }
        })
        .shared(),
        FnInvariant::new("grief-acknowledged", ContradictionCategory::Grief, |outcome, _| {
            let score = outcome.payload_f64("grief_score").unwrap_or(0.0);
            let scheduled = outcome.payload_bool("closure_scheduled").unwrap_or(false);
            if score >= GRIEF_CLOSURE_THRESHOLD && !scheduled {
                Verdict::violated_with(
                    format!("Unacknowledged grief in case {} (score {:.2})", outcome.case_id, score),
                    Severity::High,
                    json!({ "grief_score": score }),
                )
            } else {
                Verdict::Holds
            }
        })
        .recommending(Protocol::GriefClosureSequence)
        .shared(),
    ]
}
