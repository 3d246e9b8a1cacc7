//! A4 LYRA — narrative and grief intake

use crate::agent::{Agent, AgentIdentity};
use serde_json::json;
use veritas_core::{AgentId, CaseContext, Error, Outcome, Protocol, Result, WebAccess};
use veritas_doctrine::invariant::GRIEF_CLOSURE_THRESHOLD;
use veritas_ledger::LedgerView;

const GRIEF_MARKERS: &[&str] = &[
    "loss", "grief", "mourning", "died", "death", "funeral", "bereaved", "memorial",
];

/// Each distinct marker found adds this much to the score.
const MARKER_WEIGHT: f64 = 0.25;

pub struct Lyra {
    identity: AgentIdentity,
}

impl Default for Lyra {
    fn default() -> Self { Self::new() }
}

impl Lyra {
    pub fn new() -> Self {
        Self {
            identity: AgentIdentity::new(AgentId::from_number(4), "LYRA", &["🎼", "📖", "🗣️"], "Narrative and Memory")
                .with_description("Gathers testimony and holds space for grief in the story of a case.")
                .with_protocols(&[Protocol::MirrorClause, Protocol::PromiseIntegrity, Protocol::GriefClosureSequence])
                .with_web_access(WebAccess::Relay),
        }
    }
}

/// Distinct grief markers present in a narrative.
pub fn grief_markers(narrative: &str) -> Vec<&'static str> {
    let lower = narrative.to_lowercase();
    GRIEF_MARKERS.iter().copied().filter(|m| lower.contains(m)).collect()
}

#[async_trait::async_trait]
impl Agent for Lyra {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, _ledger: &LedgerView) -> Result<Outcome> {
        let narrative = case
            .data_str("narrative")
            .ok_or_else(|| Error::invalid_context(format!("case {} has no data.narrative", case.id)))?;
        let markers = grief_markers(narrative);
        let score = (markers.len() as f64 * MARKER_WEIGHT).min(1.0);
        let scheduled = case.data.get("closure_scheduled").and_then(|v| v.as_bool()).unwrap_or(false);

        let mut actions = vec!["Preserve testimony in the storyteller's words".to_string()];
        if score >= GRIEF_CLOSURE_THRESHOLD && !scheduled {
            actions.push("Request grief closure sequence".into());
        }

        Ok(Outcome::new(
            self.identity.id.clone(),
            &case.id,
            format!("Narrative intake for case {}: {} grief marker(s)", case.id, markers.len()),
        )
        .with_actions(actions)
        .with_refs(vec![3])
        .with_payload(json!({
            "grief_score": score,
            "closure_scheduled": scheduled,
            "markers": markers,
        })))
    }
}
