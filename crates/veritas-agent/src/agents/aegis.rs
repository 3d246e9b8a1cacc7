//! A2 AEGIS — bias and fairness audit
//!
//! Reads `data.modifiers`, the sentencing modifiers applied across parties in
//! a case, and reports their spread as a disproportionality score.

use crate::agent::{Agent, AgentIdentity};
use serde_json::json;
use veritas_core::{AgentId, CaseContext, Error, Outcome, Protocol, Result, WebAccess};
use veritas_doctrine::invariant::DISPROPORTIONALITY_CEILING;
use veritas_ledger::LedgerView;

pub struct Aegis {
    identity: AgentIdentity,
}

impl Default for Aegis {
    fn default() -> Self { Self::new() }
}

impl Aegis {
    pub fn new() -> Self {
        Self {
            identity: AgentIdentity::new(AgentId::from_number(2), "AEGIS", &["🛡️", "📏", "🧮"], "Bias Detection & Fairness Audit")
                .with_description("Audits for bias, disproportionality, and factual consistency.")
                .with_protocols(&[Protocol::AuditCycle, Protocol::MirrorClause])
                .with_web_access(WebAccess::Full),
        }
    }
}

fn modifiers(case: &CaseContext) -> Result<Vec<f64>> {
    let raw = case
        .data
        .get("modifiers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::invalid_context(format!("case {} has no data.modifiers array", case.id)))?;
    if raw.is_empty() {
        return Err(Error::invalid_context(format!("case {} has an empty data.modifiers", case.id)));
    }
    raw.iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| Error::invalid_context(format!("non-numeric modifier {} in case {}", v, case.id)))
        })
        .collect()
}

#[async_trait::async_trait]
impl Agent for Aegis {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, _ledger: &LedgerView) -> Result<Outcome> {
        let values = modifiers(case)?;
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = values.iter().copied().fold(f64::MAX, f64::min);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let spread = max - min;

        let mut actions = Vec::new();
        if spread > DISPROPORTIONALITY_CEILING {
            actions.push("Flag disproportionate modifiers".to_string());
            actions.push("Alert JUNO to bias finding".to_string());
        } else {
            actions.push("Record proportional sentencing".to_string());
        }

        Ok(Outcome::new(
            self.identity.id.clone(),
            &case.id,
            format!("Bias audit of case {}: modifier spread {:.2} across {} parties", case.id, spread, values.len()),
        )
        .with_actions(actions)
        .with_refs(vec![1, 2])
        .with_payload(json!({
            "disproportionality": spread,
            "mean_modifier": mean,
            "parties": values.len(),
        })))
    }
}
