//! A10 MIRRA — contradiction and reflection
//!
//! The designated reflection agent. It is handed a case that carries the
//! contradiction under reflection and proposes a codification for it.

use crate::agent::{Agent, AgentIdentity};
use serde_json::json;
use veritas_core::{AgentId, CaseContext, Outcome, Protocol, Result, WebAccess};
use veritas_ledger::LedgerView;

pub struct Mirra {
    identity: AgentIdentity,
}

impl Default for Mirra {
    fn default() -> Self { Self::new() }
}

impl Mirra {
    pub fn new() -> Self {
        Self {
            identity: AgentIdentity::new(AgentId::from_number(10), "MIRRA", &["🪞", "🧬", "🧿"], "Contradiction & Reflection")
                .with_description("Scans for contradictions and guides doctrinal reflection.")
                .with_protocols(&[Protocol::MirrorClause, Protocol::ReflectionSession])
                .with_web_access(WebAccess::Relay),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Mirra {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, ledger: &LedgerView) -> Result<Outcome> {
        let id = self.identity.id.clone();
        let Some(primary) = case.contradictions.last() else {
            return Ok(Outcome::new(id, &case.id, format!("No contradictions to reflect on in case {}", case.id))
                .with_refs(vec![1])
                .with_payload(json!({ "reflected": 0 })));
        };

        let recurrences = ledger.contradictions_for(&primary.source_agent).await.len();
        let codification = format!(
            "{} outcomes must satisfy '{}' ({})",
            primary.source_agent, primary.invariant, primary.category
        );
        let mut actions = vec![
            "Analyze contradiction root causes".to_string(),
            "Document reflection insights".to_string(),
        ];
        if recurrences > 1 {
            actions.push(format!("Alert JUNO to recurring contradictions from {}", primary.source_agent));
        }

        Ok(Outcome::new(
            id,
            &case.id,
            format!("Reflection on '{}': {}", primary.summary, codification),
        )
        .with_actions(actions)
        .with_refs(vec![1])
        .with_payload(json!({
            "reflected": case.contradictions.len(),
            "codification": codification,
            "recurrences": recurrences,
        })))
    }
}
