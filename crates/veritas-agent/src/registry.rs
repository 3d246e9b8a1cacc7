//! Process-wide agent registry.

use crate::agent::{Agent, AgentIdentity};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;
use veritas_core::{AgentId, Error, Result};

pub struct AgentRegistry {
    agents: DashMap<AgentId, Arc<dyn Agent>>,
}

impl Default for AgentRegistry {
    fn default() -> Self { Self::new() }
}

impl AgentRegistry {
    pub fn new() -> Self { Self { agents: DashMap::new() } }

    /// Register an agent. Ids are unique; a second agent with the same id is
    /// rejected and the first stays in place.
    pub fn register(&self, agent: Arc<dyn Agent>) -> Result<()> {
        let identity = agent.identity();
        identity.validate()?;
        match self.agents.entry(identity.id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateAgent(identity.id.to_string())),
            Entry::Vacant(slot) => {
                info!(agent = %identity.id, name = %identity.name, "agent registered");
                slot.insert(agent);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<dyn Agent>> {
        self.agents.get(id).map(|a| a.value().clone())
    }

    /// Look up a raw id as it appears in a case file.
    pub fn resolve(&self, raw: &str) -> Result<Arc<dyn Agent>> {
        let id = AgentId::parse(raw).map_err(|_| Error::AgentNotFound(raw.to_string()))?;
        self.get(&id).ok_or_else(|| Error::AgentNotFound(raw.to_string()))
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// Identities ordered by agent number.
    pub fn identities(&self) -> Vec<AgentIdentity> {
        let mut ids: Vec<AgentIdentity> = self.agents.iter().map(|a| a.value().identity().clone()).collect();
        ids.sort_by_key(|i| i.id.number());
        ids
    }

    pub fn len(&self) -> usize { self.agents.len() }

    pub fn is_empty(&self) -> bool { self.agents.is_empty() }
}
