//! Veritas Agent — agents, protocol selection, and the audit cycle.
//!
//! Each built-in agent is a self-contained file in src/agents/.
//! To add an agent: create the file, implement `Agent`, register below.

pub mod agent;
pub mod agents;
pub mod audit;
pub mod config;
pub mod handler;
pub mod policy;
pub mod registry;

pub use agent::{run_agent, Agent, AgentIdentity};
pub use audit::{
    AgentRun, AgentStatus, AuditCycle, CycleReport, CycleSettings, CycleState, Invocation, InvocationResult,
};
pub use config::VeritasConfig;
pub use handler::{LoggingHandler, ProtocolHandler};
pub use policy::{default_protocol, CategoryPolicy, ProtocolPolicy};
pub use registry::AgentRegistry;

use std::sync::Arc;
use veritas_core::Result;

/// Registry holding every built-in agent.
pub fn standard_registry() -> Result<AgentRegistry> {
    let registry = AgentRegistry::new();
    registry.register(Arc::new(agents::Juno::new()))?;
    registry.register(Arc::new(agents::Aegis::new()))?;
    registry.register(Arc::new(agents::Lyra::new()))?;
    registry.register(Arc::new(agents::Mirra::new()))?;
    Ok(registry)
}
