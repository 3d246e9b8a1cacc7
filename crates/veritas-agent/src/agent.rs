//! Agent capability and the process-then-check composition step.
//!
//! An agent only transforms a case into an outcome. It sees the ledger
//! read-only and never appends to it. `run_agent` is the one place an
//! outcome meets the Mirror Clause, so every outcome is checked exactly once
//! and an agent dropped mid-`process` leaves nothing behind.

use serde::{Deserialize, Serialize};
use tracing::debug;
use veritas_core::{AgentId, CaseContext, Error, Outcome, Protocol, Result, WebAccess};
use veritas_doctrine::{ClauseRecord, DoctrineSnapshot};
use veritas_ledger::{LedgerView, MemoryLedger};

/// Who an agent is. Immutable once registered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: AgentId,
    pub name: String,
    /// Symbolic tags for the agent's domain affinities, in order.
    pub glyphs: Vec<String>,
    pub domain: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub web_access: WebAccess,
}

impl AgentIdentity {
    pub fn new(id: AgentId, name: impl Into<String>, glyphs: &[&str], domain: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            glyphs: glyphs.iter().map(|g| g.to_string()).collect(),
            domain: domain.into(),
            description: String::new(),
            protocols: Vec::new(),
            web_access: WebAccess::None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_protocols(mut self, protocols: &[Protocol]) -> Self {
        self.protocols = protocols.to_vec();
        self
    }

    pub fn with_web_access(mut self, web_access: WebAccess) -> Self {
        self.web_access = web_access;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidIdentity(format!("{} has no name", self.id)));
        }
        if self.glyphs.is_empty() {
            return Err(Error::InvalidIdentity(format!("{} has no glyphs", self.id)));
        }
        Ok(())
    }
}

/// The agent capability. Implement this to add a new agent.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    fn identity(&self) -> &AgentIdentity;

    fn id(&self) -> &AgentId {
        &self.identity().id
    }

    /// Turn a case into an outcome. Fails with `InvalidContext` when the case
    /// lacks something this agent needs.
    async fn process(&self, case: &CaseContext, ledger: &LedgerView) -> Result<Outcome>;
}

/// Process a case and run the Mirror Clause on the outcome.
///
/// `None` fails with `InvalidContext` before the agent runs and writes
/// nothing. An error from `process` also writes nothing.
pub async fn run_agent(
    agent: &dyn Agent,
    case: Option<&CaseContext>,
    doctrine: &DoctrineSnapshot,
    ledger: &MemoryLedger,
) -> Result<(Outcome, ClauseRecord)> {
    let case = case.ok_or_else(|| Error::invalid_context(format!("{} received no context", agent.id())))?;
    let outcome = agent.process(case, &ledger.view()).await?;
    debug!(agent = %agent.id(), case = %case.id, "outcome produced");
    let record = veritas_doctrine::check(&outcome, doctrine, ledger).await?;
    Ok((outcome, record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_needs_glyphs() {
        let bare = AgentIdentity::new(AgentId::from_number(3), "ORION", &[], "Rights");
        assert!(matches!(bare.validate(), Err(Error::InvalidIdentity(_))));

        let ok = AgentIdentity::new(AgentId::from_number(3), "ORION", &["🌌"], "Rights");
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn identity_serializes_web_access_lowercase() {
        let id = AgentIdentity::new(AgentId::from_number(1), "JUNO", &["⚖️"], "Doctrine")
            .with_web_access(WebAccess::Relay);
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["web_access"], "relay");
        assert_eq!(json["id"], "A1");
    }
}
