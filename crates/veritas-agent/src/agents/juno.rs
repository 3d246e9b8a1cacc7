//! A1 JUNO — doctrine arbiter

use crate::agent::{Agent, AgentIdentity};
use serde_json::json;
use veritas_core::{AgentId, CaseContext, Error, Outcome, Protocol, Result, WebAccess};
use veritas_ledger::LedgerView;

pub struct Juno {
    identity: AgentIdentity,
}

impl Default for Juno {
    fn default() -> Self { Self::new() }
}

impl Juno {
    pub fn new() -> Self {
        Self {
            identity: AgentIdentity::new(AgentId::from_number(1), "JUNO", &["⚖️", "👁️", "🌿"], "Judicial Doctrine Core")
                .with_description("Upholds doctrine, leads councils, synchronizes agent logic.")
                .with_protocols(&[Protocol::MirrorClause, Protocol::DoctrineReview])
                .with_web_access(WebAccess::Relay),
        }
    }
}

#[async_trait::async_trait]
impl Agent for Juno {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, ledger: &LedgerView) -> Result<Outcome> {
        if case.books_applied.is_empty() {
            return Err(Error::invalid_context(format!(
                "case {} names no applied books; JUNO cannot review doctrine",
                case.id
            )));
        }

        let prior = ledger.contradiction_len().await;
        let mut actions = vec!["Monitor doctrinal adherence".to_string()];
        if prior > 0 {
            actions.push("Activate Mirror Clause protocol".into());
        }
        if !case.contradictions.is_empty() {
            actions.push("Convene MIRRA for contradiction analysis".into());
        }
        if case.involved_agents.len() > 1 {
            actions.push("Verify inter-agent logic consistency".into());
        }

        Ok(Outcome::new(
            self.identity.id.clone(),
            &case.id,
            format!("Doctrinal review of case {} against books {:?}", case.id, case.books_applied),
        )
        .with_actions(actions)
        .with_refs(case.books_applied.clone())
        .with_payload(json!({
            "books_applied": case.books_applied,
            "prior_contradictions": prior,
        })))
    }
}
