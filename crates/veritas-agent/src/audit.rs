//! Audit cycle — runs a roster of agents over one case and reacts to what
//! the Mirror Clause found.
//!
//! ```text
//!   Idle → Running → Clean ─────────────────────────────→ Closed
//!                  → ContradictionsFound → ProtocolsInvoked → Closed
//! ```
//!
//! The roster runs sequentially in the order given. Each agent's step is
//! process + Mirror Clause (`run_agent`), bounded by the agent timeout and
//! raced against the cycle's cancellation token. The cycle itself appends
//! three snapshots (start, agents done, closed) and one log line per protocol
//! invocation; while agents run, only the Mirror Clause writes.

use crate::agent::{run_agent, Agent};
use crate::config::VeritasConfig;
use crate::handler::{LoggingHandler, ProtocolHandler};
use crate::policy::{CategoryPolicy, ProtocolPolicy};
use crate::registry::AgentRegistry;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use veritas_core::{AgentId, CaseContext, Error, Outcome, Protocol, Result};
use veritas_doctrine::{ClauseRecord, DoctrineSource};
use veritas_ledger::{ContradictionEntry, LogEntry, MemoryLedger, Snapshot};

// ============================================================
// State
// ============================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
    Clean,
    ContradictionsFound,
    ProtocolsInvoked,
    Closed,
}

impl CycleState {
    pub fn can_advance(self, to: CycleState) -> bool {
        use CycleState::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Running, Clean)
                | (Running, ContradictionsFound)
                | (Clean, Closed)
                | (ContradictionsFound, ProtocolsInvoked)
                | (ProtocolsInvoked, Closed)
        )
    }

    pub fn advance(self, to: CycleState) -> Result<CycleState> {
        if self.can_advance(to) {
            Ok(to)
        } else {
            Err(Error::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Clean => "clean",
            Self::ContradictionsFound => "contradictions_found",
            Self::ProtocolsInvoked => "protocols_invoked",
            Self::Closed => "closed",
        };
        f.pad(s)
    }
}

// ============================================================
// Report
// ============================================================

#[derive(Clone, Debug)]
pub enum AgentStatus {
    Consistent,
    Contradiction(ContradictionEntry),
    Failed { kind: &'static str, message: String },
}

/// One roster entry's result.
#[derive(Clone, Debug)]
pub struct AgentRun {
    /// Id as it appeared in the roster.
    pub agent: String,
    pub status: AgentStatus,
    pub outcome: Option<Outcome>,
}

impl AgentRun {
    fn completed(agent: &str, outcome: Outcome, record: ClauseRecord) -> Self {
        let status = match record {
            ClauseRecord::Consistent(_) => AgentStatus::Consistent,
            ClauseRecord::Contradiction(entry) => AgentStatus::Contradiction(entry),
        };
        Self { agent: agent.to_string(), status, outcome: Some(outcome) }
    }

    fn failed(agent: &str, error: &Error) -> Self {
        Self {
            agent: agent.to_string(),
            status: AgentStatus::Failed { kind: error.kind(), message: error.to_string() },
            outcome: None,
        }
    }

    pub fn contradiction(&self) -> Option<&ContradictionEntry> {
        match &self.status {
            AgentStatus::Contradiction(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, AgentStatus::Failed { .. })
    }
}

#[derive(Clone, Debug)]
pub enum InvocationResult {
    /// Logged and handed to the protocol handler.
    Recorded,
    /// The reflection agent ran. `None` when its own outcome contradicted doctrine.
    Reflected { codification: Option<String> },
    Nested(Box<CycleReport>),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct Invocation {
    pub protocol: Protocol,
    pub contradiction: ContradictionEntry,
    /// The invocation line, or `None` if the best-effort write was refused.
    pub log: Option<LogEntry>,
    pub result: InvocationResult,
}

#[derive(Clone, Debug)]
pub struct CycleReport {
    pub case_id: String,
    /// 1 for a root cycle.
    pub depth: usize,
    pub state: CycleState,
    pub runs: Vec<AgentRun>,
    pub invocations: Vec<Invocation>,
    /// Contradictions codified through reflection in this cycle.
    pub resolved: usize,
    pub start: Snapshot,
    pub agents_done: Snapshot,
    pub closed: Snapshot,
}

impl CycleReport {
    pub fn contradictions(&self) -> Vec<&ContradictionEntry> {
        self.runs.iter().filter_map(|r| r.contradiction()).collect()
    }

    pub fn failures(&self) -> Vec<&AgentRun> {
        self.runs.iter().filter(|r| r.is_failed()).collect()
    }

    /// Resolved count including nested cycles.
    pub fn total_resolved(&self) -> usize {
        self.resolved
            + self
                .invocations
                .iter()
                .map(|i| match &i.result {
                    InvocationResult::Nested(report) => report.total_resolved(),
                    _ => 0,
                })
                .sum::<usize>()
    }
}

// ============================================================
// Settings
// ============================================================

#[derive(Clone, Debug)]
pub struct CycleSettings {
    pub max_depth: usize,
    pub agent_timeout: Duration,
    pub reflection_agent: AgentId,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            max_depth: 5,
            agent_timeout: Duration::from_secs(30),
            reflection_agent: AgentId::from_number(10),
        }
    }
}

impl CycleSettings {
    pub fn from_config(config: &VeritasConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_depth: config.audit.max_nesting_depth,
            agent_timeout: config.agent_timeout(),
            reflection_agent: config.reflection_agent()?,
        })
    }
}

// ============================================================
// Cycle
// ============================================================

pub struct AuditCycle {
    registry: Arc<AgentRegistry>,
    doctrine: Arc<dyn DoctrineSource>,
    ledger: MemoryLedger,
    policy: Arc<dyn ProtocolPolicy>,
    handler: Arc<dyn ProtocolHandler>,
    settings: CycleSettings,
    cancel: CancellationToken,
}

impl AuditCycle {
    pub fn new(registry: Arc<AgentRegistry>, doctrine: Arc<dyn DoctrineSource>, ledger: MemoryLedger) -> Self {
        Self {
            registry,
            doctrine,
            ledger,
            policy: Arc::new(CategoryPolicy::new()),
            handler: Arc::new(LoggingHandler),
            settings: CycleSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Settings and policy overrides from config.
    pub fn from_config(
        config: &VeritasConfig,
        registry: Arc<AgentRegistry>,
        doctrine: Arc<dyn DoctrineSource>,
        ledger: MemoryLedger,
    ) -> Result<Self> {
        Ok(Self::new(registry, doctrine, ledger)
            .with_settings(CycleSettings::from_config(config)?)
            .with_policy(Arc::new(config.policy()?)))
    }

    pub fn with_policy(mut self, policy: Arc<dyn ProtocolPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_settings(mut self, settings: CycleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Run one root cycle. `None` fails with `InvalidContext` before anything
    /// is written.
    pub async fn run(&self, roster: &[String], case: Option<&CaseContext>) -> Result<CycleReport> {
        let case = case.ok_or_else(|| Error::invalid_context("audit cycle received no context"))?;
        self.run_at(1, roster, case).await
    }

    /// Run one root cycle with the case's own `involved_agents` as roster.
    pub async fn run_case(&self, case: &CaseContext) -> Result<CycleReport> {
        self.run_at(1, &case.involved_agents, case).await
    }

    fn run_at<'a>(
        &'a self,
        depth: usize,
        roster: &'a [String],
        case: &'a CaseContext,
    ) -> BoxFuture<'a, Result<CycleReport>> {
        async move {
            let limit = self.settings.max_depth;
            if depth > limit {
                warn!(case = %case.id, depth, limit, "audit cycle nesting limit exceeded");
                return Err(Error::RecursionLimit { depth, limit });
            }
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled { completed: 0 });
            }

            let mut state = CycleState::Idle;
            let start = self.ledger.snapshot(format!("cycle {} depth {} start", case.id, depth)).await?;
            state = state.advance(CycleState::Running)?;
            info!(case = %case.id, cycle = depth, agents = roster.len(), "audit cycle running");

            let mut runs = Vec::with_capacity(roster.len());
            for (completed, raw) in roster.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled { completed });
                }
                let run = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(Error::Cancelled { completed }),
                    run = self.run_one(raw, case) => run?,
                };
                runs.push(run);
            }

            let agents_done = self.ledger.snapshot(format!("cycle {} depth {} agents done", case.id, depth)).await?;
            let found: Vec<ContradictionEntry> = runs.iter().filter_map(|r| r.contradiction().cloned()).collect();

            let mut invocations = Vec::with_capacity(found.len());
            let mut resolved = 0;
            if found.is_empty() {
                state = state.advance(CycleState::Clean)?;
            } else {
                state = state.advance(CycleState::ContradictionsFound)?;
                for entry in found {
                    if self.cancel.is_cancelled() {
                        return Err(Error::Cancelled { completed: runs.len() });
                    }
                    let invocation = self.invoke(depth, roster, case, entry).await?;
                    if matches!(invocation.result, InvocationResult::Reflected { codification: Some(_) }) {
                        resolved += 1;
                    }
                    invocations.push(invocation);
                }
                state = state.advance(CycleState::ProtocolsInvoked)?;
            }

            let closed = self.ledger.snapshot(format!("cycle {} depth {} closed", case.id, depth)).await?;
            state = state.advance(CycleState::Closed)?;
            info!(
                case = %case.id,
                cycle = depth,
                failed = runs.iter().filter(|r| r.is_failed()).count(),
                invoked = invocations.len(),
                resolved,
                "audit cycle closed"
            );

            Ok(CycleReport {
                case_id: case.id.clone(),
                depth,
                state,
                runs,
                invocations,
                resolved,
                start,
                agents_done,
                closed,
            })
        }
        .boxed()
    }

    /// One roster entry. Errors out only when the failure is fatal to the cycle.
    async fn run_one(&self, raw: &str, case: &CaseContext) -> Result<AgentRun> {
        let agent = match self.registry.resolve(raw) {
            Ok(agent) => agent,
            Err(e) => {
                warn!(agent = raw, case = %case.id, "agent not registered");
                return Ok(AgentRun::failed(raw, &e));
            }
        };
        match self.step(agent.as_ref(), case).await {
            Ok((outcome, record)) => Ok(AgentRun::completed(raw, outcome, record)),
            Err(e) if e.is_fatal_to_cycle() => Err(e),
            Err(e) => {
                warn!(agent = raw, case = %case.id, error = %e, "agent failed");
                Ok(AgentRun::failed(raw, &e))
            }
        }
    }

    /// Doctrine snapshot, process, Mirror Clause; all inside the agent timeout.
    async fn step(&self, agent: &dyn Agent, case: &CaseContext) -> Result<(Outcome, ClauseRecord)> {
        let millis = self.settings.agent_timeout.as_millis() as u64;
        let work = async {
            let doctrine = self.doctrine.snapshot().await?;
            run_agent(agent, Some(case), &doctrine, &self.ledger).await
        };
        tokio::time::timeout(self.settings.agent_timeout, work)
            .await
            .map_err(|_| Error::timeout(format!("{} process", agent.id()), millis))?
    }

    async fn invoke(
        &self,
        depth: usize,
        roster: &[String],
        case: &CaseContext,
        entry: ContradictionEntry,
    ) -> Result<Invocation> {
        let protocol = self.policy.select(entry.contradiction.category);
        let line = format!(
            "Protocol {} invoked for contradiction {} from {}: {}",
            protocol,
            entry.id,
            entry.source_agent(),
            entry.summary()
        );
        let log = match self.ledger.write(line).await {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(protocol = %protocol, error = %e, "protocol invocation not recorded");
                None
            }
        };

        if let Err(e) = self.handler.on_invoke(protocol, &entry).await {
            warn!(protocol = %protocol, error = %e, "protocol handler failed");
            return Ok(Invocation {
                protocol,
                contradiction: entry,
                log,
                result: InvocationResult::Failed(e.to_string()),
            });
        }

        let result = match protocol {
            Protocol::ReflectionSession => self.reflect(case, &entry).await?,
            Protocol::AuditCycle => match self.run_at(depth + 1, roster, case).await {
                Ok(report) => InvocationResult::Nested(Box::new(report)),
                Err(e) if e.is_fatal_to_cycle() => return Err(e),
                Err(e) => InvocationResult::Failed(e.to_string()),
            },
            Protocol::MirrorClause
            | Protocol::DoctrineReview
            | Protocol::TimeReversal
            | Protocol::WebAccess
            | Protocol::GriefClosureSequence
            | Protocol::PromiseIntegrity
            | Protocol::SanctuaryLock => InvocationResult::Recorded,
        };

        Ok(Invocation { protocol, contradiction: entry, log, result })
    }

    /// Re-run the reflection agent with the contradiction in context. A
    /// consistent reflection is codified into doctrine.
    async fn reflect(&self, case: &CaseContext, entry: &ContradictionEntry) -> Result<InvocationResult> {
        let id = &self.settings.reflection_agent;
        let Some(reflector) = self.registry.get(id) else {
            return Ok(InvocationResult::Failed(format!("reflection agent {} not registered", id)));
        };
        let reflective = case.reflecting_on(&entry.contradiction);
        match self.step(reflector.as_ref(), &reflective).await {
            Ok((_, ClauseRecord::Consistent(_))) => match self.doctrine.reflect(&entry.contradiction).await {
                Ok(codification) => {
                    debug!(contradiction = %entry.id, "reflection codified");
                    Ok(InvocationResult::Reflected { codification: Some(codification) })
                }
                Err(e) => Ok(InvocationResult::Failed(e.to_string())),
            },
            Ok((_, ClauseRecord::Contradiction(own))) => {
                // already in the ledger; not routed through the policy again
                warn!(contradiction = %entry.id, reflection = %own.id, "reflection contradicted doctrine");
                Ok(InvocationResult::Reflected { codification: None })
            }
            Err(e) if e.is_fatal_to_cycle() => Err(e),
            Err(e) => Ok(InvocationResult::Failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_transition_skips_running() {
        assert!(CycleState::Idle.advance(CycleState::Clean).is_err());
        assert!(CycleState::Idle.advance(CycleState::Closed).is_err());
        assert!(CycleState::ContradictionsFound.advance(CycleState::Closed).is_err());
    }

    #[test]
    fn closed_is_terminal() {
        for to in [
            CycleState::Idle,
            CycleState::Running,
            CycleState::Clean,
            CycleState::ContradictionsFound,
            CycleState::ProtocolsInvoked,
            CycleState::Closed,
        ] {
            assert!(!CycleState::Closed.can_advance(to));
        }
    }

    #[test]
    fn invalid_transition_names_both_states() {
        match CycleState::Clean.advance(CycleState::ProtocolsInvoked) {
            Err(Error::InvalidTransition { from, to }) => {
                assert_eq!(from, "clean");
                assert_eq!(to, "protocols_invoked");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }
}
