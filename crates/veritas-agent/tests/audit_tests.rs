//! Tests for veritas-agent: agents, the audit cycle, and its failure modes

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use veritas_agent::*;
use veritas_core::{
    AgentId, CaseContext, ContradictionCategory, Error, Outcome, Protocol, Result, Severity,
};
use veritas_doctrine::{
    standard_books, DoctrineLibrary, DoctrineSnapshot, DoctrineSource, FnInvariant, Verdict,
};
use veritas_ledger::{ContradictionEntry, LedgerMetrics, LedgerView, MemoryLedger};

fn roster(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// A1 stays within doctrine; A2 finds a 0.7 modifier spread.
fn sentencing_case() -> CaseContext {
    CaseContext::new("C-012", "Sentencing review")
        .with_agents(&["A1", "A2"])
        .with_books(vec![1, 4])
        .with_data("modifiers", json!([0.8, 1.5]))
}

fn standard_cycle(ledger: &MemoryLedger) -> AuditCycle {
    let registry = Arc::new(standard_registry().unwrap());
    AuditCycle::new(registry, Arc::new(DoctrineLibrary::standard()), ledger.clone())
}

/// Echoes `data.finding` as its summary. A blank finding is a logical contradiction.
struct Echo {
    identity: AgentIdentity,
}

impl Echo {
    fn new() -> Self {
        Self { identity: AgentIdentity::new(AgentId::from_number(7), "ECHO", &["🔁"], "Testing") }
    }
}

#[async_trait::async_trait]
impl Agent for Echo {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, _ledger: &LedgerView) -> Result<Outcome> {
        let finding = case.data_str("finding").unwrap_or_default();
        Ok(Outcome::new(self.identity.id.clone(), &case.id, finding).with_refs(vec![1]))
    }
}

/// Never finishes on its own.
struct Stalled {
    identity: AgentIdentity,
}

impl Stalled {
    fn new() -> Self {
        Self { identity: AgentIdentity::new(AgentId::from_number(50), "STALL", &["⏳"], "Testing") }
    }
}

#[async_trait::async_trait]
impl Agent for Stalled {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, _ledger: &LedgerView) -> Result<Outcome> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Outcome::new(self.identity.id.clone(), &case.id, "eventually"))
    }
}

/// Reports systemic drift on its first `levels - 1` calls, so each cycle
/// triggers a nested one until `levels` cycles have run.
struct Recurring {
    identity: AgentIdentity,
    levels: usize,
    calls: Arc<AtomicUsize>,
}

impl Recurring {
    fn new(levels: usize, calls: Arc<AtomicUsize>) -> Self {
        Self {
            identity: AgentIdentity::new(AgentId::from_number(77), "OUROBOROS", &["🐍"], "Testing"),
            levels,
            calls,
        }
    }
}

#[async_trait::async_trait]
impl Agent for Recurring {
    fn identity(&self) -> &AgentIdentity { &self.identity }

    async fn process(&self, case: &CaseContext, _ledger: &LedgerView) -> Result<Outcome> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Outcome::new(self.identity.id.clone(), &case.id, format!("pass {}", n))
            .with_payload(json!({ "systemic": n < self.levels })))
    }
}

fn systemic_doctrine() -> DoctrineLibrary {
    DoctrineLibrary::new(
        "1.0.0",
        standard_books(),
        vec![FnInvariant::new("no-systemic-drift", ContradictionCategory::Systemic, |outcome, _| {
            if outcome.payload_bool("systemic") == Some(true) {
                Verdict::violated("systemic drift", Severity::High)
            } else {
                Verdict::Holds
            }
        })
        .shared()],
    )
}

fn recurring_cycle(levels: usize, max_depth: usize, calls: Arc<AtomicUsize>, ledger: &MemoryLedger) -> AuditCycle {
    let registry = AgentRegistry::new();
    registry.register(Arc::new(Recurring::new(levels, calls))).unwrap();
    AuditCycle::new(Arc::new(registry), Arc::new(systemic_doctrine()), ledger.clone()).with_settings(CycleSettings {
        max_depth,
        ..CycleSettings::default()
    })
}

/// Doctrine that cannot be loaded.
struct Unreachable;

#[async_trait::async_trait]
impl DoctrineSource for Unreachable {
    async fn snapshot(&self) -> Result<DoctrineSnapshot> {
        Err(Error::doctrine_unavailable("library offline"))
    }

    async fn reflect(&self, _c: &veritas_core::Contradiction) -> Result<String> {
        Err(Error::doctrine_unavailable("library offline"))
    }
}

/// Records what it was handed and checks the ledger already holds the invocation.
struct Witness {
    ledger: MemoryLedger,
    seen: Mutex<Vec<(Protocol, String)>>,
    recorded_first: AtomicUsize,
}

#[async_trait::async_trait]
impl ProtocolHandler for Witness {
    async fn on_invoke(&self, protocol: Protocol, entry: &ContradictionEntry) -> Result<()> {
        let id = entry.id.to_string();
        if self.ledger.logs().await.iter().any(|l| l.text.starts_with("Protocol") && l.text.contains(&id)) {
            self.recorded_first.fetch_add(1, Ordering::SeqCst);
        }
        self.seen.lock().unwrap().push((protocol, id));
        Ok(())
    }
}

// ===========================================================================
// The two-agent cycle
// ===========================================================================

#[tokio::test]
async fn consistent_and_violating_agents_in_one_cycle() {
    let ledger = MemoryLedger::new();
    let report = standard_cycle(&ledger).run_case(&sentencing_case()).await.unwrap();

    assert_eq!(report.state, CycleState::Closed);
    assert_eq!(report.depth, 1);

    // one Mirror Clause entry per agent while the roster ran
    let during = ledger.logs_between(report.start.index, report.agents_done.index).await.unwrap();
    assert_eq!(during.len(), 2);
    assert!(during[0].text.contains("A1"));

    let contradictions = ledger.contradictions().await;
    assert_eq!(contradictions.len(), 1);
    let c = &contradictions[0];
    assert_eq!(c.source_agent().as_str(), "A2");
    assert_eq!(c.contradiction.category, ContradictionCategory::Bias);

    let after = ledger.logs_since(report.agents_done.index).await.unwrap();
    let invocation = after
        .iter()
        .find(|l| l.text.contains(&c.id.to_string()))
        .expect("invocation line for A2's contradiction");
    assert!(invocation.text.contains("DoctrineReview"));
    assert!(invocation.text.contains(c.summary()));

    assert_eq!(report.invocations.len(), 1);
    assert_eq!(report.invocations[0].protocol, Protocol::DoctrineReview);
    assert!(matches!(report.invocations[0].result, InvocationResult::Recorded));
}

#[tokio::test]
async fn clean_cycle_invokes_nothing() {
    let ledger = MemoryLedger::new();
    let case = sentencing_case().with_data("modifiers", json!([1.0, 1.1]));
    let report = standard_cycle(&ledger).run_case(&case).await.unwrap();
    assert_eq!(report.state, CycleState::Closed);
    assert!(report.contradictions().is_empty());
    assert!(report.invocations.is_empty());
    assert_eq!(ledger.logs_since(report.agents_done.index).await.unwrap().len(), 0);
    assert_eq!(ledger.snapshots().await.len(), 3);
}

#[tokio::test]
async fn grief_routes_to_closure_sequence() {
    let ledger = MemoryLedger::new();
    let case = CaseContext::new("C-031", "Intake")
        .with_agents(&["A4"])
        .with_data("narrative", json!("Her brother died; the family is in mourning and the funeral was delayed."));
    let report = standard_cycle(&ledger).run_case(&case).await.unwrap();
    assert_eq!(report.invocations.len(), 1);
    assert_eq!(report.invocations[0].protocol, Protocol::GriefClosureSequence);
    assert_eq!(report.invocations[0].contradiction.contradiction.severity, Severity::High);
}

// ===========================================================================
// Null context
// ===========================================================================

#[tokio::test]
async fn missing_context_fails_without_writes() {
    let ledger = MemoryLedger::new();
    let registry = standard_registry().unwrap();
    let doctrine = DoctrineLibrary::standard().snapshot().await.unwrap();

    for identity in registry.identities() {
        let agent = registry.get(&identity.id).unwrap();
        let err = run_agent(agent.as_ref(), None, &doctrine, &ledger).await.unwrap_err();
        assert!(matches!(err, Error::InvalidContext(_)), "{} accepted no context", identity.id);
    }

    let err = standard_cycle(&ledger).run(&roster(&["A1"]), None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidContext(_)));

    let contents = ledger.contents().await;
    assert!(contents.logs.is_empty());
    assert!(contents.contradictions.is_empty());
    assert!(contents.snapshots.is_empty());

    assert!(matches!(CaseContext::from_value(serde_json::Value::Null), Err(Error::InvalidContext(_))));
}

#[tokio::test]
async fn agent_missing_required_field_writes_nothing() {
    let ledger = MemoryLedger::new();
    let doctrine = DoctrineLibrary::standard().snapshot().await.unwrap();
    let case = CaseContext::new("C-1", "no books");
    let err = run_agent(&agents::Juno::new(), Some(&case), &doctrine, &ledger).await.unwrap_err();
    assert!(matches!(err, Error::InvalidContext(_)));
    assert_eq!(ledger.log_len().await, 0);
}

// ===========================================================================
// Policy
// ===========================================================================

#[test]
fn selection_depends_only_on_category() {
    let policy = CategoryPolicy::new().with_override(ContradictionCategory::Evidence, Protocol::SanctuaryLock);
    for category in ContradictionCategory::ALL {
        let first = policy.select(category);
        for _ in 0..50 {
            assert_eq!(policy.select(category), first);
        }
    }
    assert_eq!(policy.select(ContradictionCategory::Evidence), Protocol::SanctuaryLock);
}

// ===========================================================================
// Recursion
// ===========================================================================

#[tokio::test]
async fn nesting_past_the_limit_is_fatal() {
    let ledger = MemoryLedger::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cycle = recurring_cycle(10, 5, calls.clone(), &ledger);
    let case = CaseContext::new("C-loop", "Self-similar audit");

    let err = cycle.run(&roster(&["A77"]), Some(&case)).await.unwrap_err();
    assert!(matches!(err, Error::RecursionLimit { depth: 6, limit: 5 }));
    // one agent invocation per level, none at depth 6
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(ledger.contradiction_len().await, 5);
}

#[tokio::test]
async fn nesting_within_the_limit_closes() {
    let ledger = MemoryLedger::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cycle = recurring_cycle(10, 10, calls.clone(), &ledger);
    let case = CaseContext::new("C-loop", "Self-similar audit");

    let report = cycle.run(&roster(&["A77"]), Some(&case)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    let mut depth = 1;
    let mut current = &report;
    while let Some(InvocationResult::Nested(inner)) = current.invocations.first().map(|i| &i.result) {
        depth += 1;
        assert_eq!(inner.depth, depth);
        assert_eq!(inner.state, CycleState::Closed);
        current = &**inner;
    }
    assert_eq!(depth, 10);
}

#[tokio::test]
async fn config_file_sets_the_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("veritas.toml");
    std::fs::write(&path, "[audit]\nmax_nesting_depth = 2\n").unwrap();
    let config = VeritasConfig::load(&path);

    let ledger = MemoryLedger::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = AgentRegistry::new();
    registry.register(Arc::new(Recurring::new(10, calls.clone()))).unwrap();
    let cycle = AuditCycle::from_config(&config, Arc::new(registry), Arc::new(systemic_doctrine()), ledger).unwrap();

    let err = cycle.run(&roster(&["A77"]), Some(&CaseContext::new("C-2", "x"))).await.unwrap_err();
    assert!(matches!(err, Error::RecursionLimit { depth: 3, limit: 2 }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ===========================================================================
// Partial failure
// ===========================================================================

#[tokio::test]
async fn failed_agents_do_not_stop_the_roster() {
    let ledger = MemoryLedger::new();
    // A99 is not registered; A4 needs a narrative this case lacks
    let case = sentencing_case().with_agents(&["A1", "A99", "A4", "A2"]);
    let report = standard_cycle(&ledger).run_case(&case).await.unwrap();

    assert_eq!(report.state, CycleState::Closed);
    assert_eq!(report.runs.len(), 4);
    let kinds: Vec<_> = report
        .failures()
        .iter()
        .map(|r| match &r.status {
            AgentStatus::Failed { kind, .. } => *kind,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(kinds, vec!["agent_not_found", "invalid_context"]);
    assert_eq!(report.contradictions().len(), 1);
    assert_eq!(ledger.contradiction_len().await, 1);
}

#[tokio::test]
async fn unreachable_doctrine_fails_each_agent_cleanly() {
    let ledger = MemoryLedger::new();
    let registry = Arc::new(standard_registry().unwrap());
    let cycle = AuditCycle::new(registry, Arc::new(Unreachable), ledger.clone());
    let report = cycle.run_case(&sentencing_case()).await.unwrap();

    assert_eq!(report.failures().len(), 2);
    assert_eq!(report.state, CycleState::Closed);
    assert_eq!(ledger.log_len().await, 0);
    assert_eq!(ledger.contradiction_len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_agent_times_out() {
    let ledger = MemoryLedger::new();
    let registry = standard_registry().unwrap();
    registry.register(Arc::new(Stalled::new())).unwrap();
    let cycle = AuditCycle::new(Arc::new(registry), Arc::new(DoctrineLibrary::standard()), ledger.clone())
        .with_settings(CycleSettings { agent_timeout: Duration::from_millis(50), ..CycleSettings::default() });

    let case = sentencing_case().with_agents(&["A50", "A1"]);
    let report = cycle.run_case(&case).await.unwrap();
    assert!(matches!(report.runs[0].status, AgentStatus::Failed { kind: "timeout", .. }));
    assert!(matches!(report.runs[1].status, AgentStatus::Consistent));
    assert_eq!(ledger.log_len().await, 1);
}

// ===========================================================================
// Cancellation
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn cancellation_leaves_a_completed_prefix() {
    let ledger = MemoryLedger::new();
    let registry = standard_registry().unwrap();
    registry.register(Arc::new(Stalled::new())).unwrap();
    let token = CancellationToken::new();
    let cycle = AuditCycle::new(Arc::new(registry), Arc::new(DoctrineLibrary::standard()), ledger.clone())
        .with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    let case = sentencing_case().with_agents(&["A1", "A50", "A2"]);
    let err = cycle.run_case(&case).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { completed: 1 }));

    // A1 finished; A2 never started
    let contents = ledger.contents().await;
    assert_eq!(contents.logs.len(), 1);
    assert!(contents.contradictions.is_empty());
}

#[tokio::test]
async fn cancelled_before_start_writes_nothing() {
    let ledger = MemoryLedger::new();
    let cycle = standard_cycle(&ledger);
    cycle.cancellation().cancel();
    let err = cycle.run_case(&sentencing_case()).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { completed: 0 }));
    assert!(ledger.snapshots().await.is_empty());
}

// ===========================================================================
// Reflection
// ===========================================================================

#[tokio::test]
async fn reflection_session_codifies_doctrine() {
    let ledger = MemoryLedger::new();
    let registry = standard_registry().unwrap();
    registry.register(Arc::new(Echo::new())).unwrap();
    let library = Arc::new(DoctrineLibrary::standard());
    let cycle = AuditCycle::new(Arc::new(registry), library.clone(), ledger.clone());

    let case = CaseContext::new("C-044", "Hollow finding").with_data("finding", json!("  "));
    let report = cycle.run(&roster(&["A7"]), Some(&case)).await.unwrap();

    assert_eq!(report.invocations.len(), 1);
    let invocation = &report.invocations[0];
    assert_eq!(invocation.protocol, Protocol::ReflectionSession);
    match &invocation.result {
        InvocationResult::Reflected { codification: Some(text) } => {
            assert!(text.contains(invocation.contradiction.summary()));
        }
        other => panic!("expected codification, got {:?}", other),
    }
    assert_eq!(report.resolved, 1);
    assert_eq!(library.version().await, "5.4.2");
    assert_eq!(library.codifications().await.len(), 1);

    // MIRRA's own outcome went through the Mirror Clause
    let logs = ledger.logs().await;
    assert!(logs.iter().any(|l| l.text.starts_with("Mirror Clause: A10")));

    let metrics = LedgerMetrics::calculate(&ledger.view(), report.total_resolved()).await;
    assert!((metrics.emotional_sovereignty_index - 0.92).abs() < 1e-9);
}

#[tokio::test]
async fn reflection_without_reflector_is_reported() {
    let ledger = MemoryLedger::new();
    let registry = AgentRegistry::new();
    registry.register(Arc::new(Echo::new())).unwrap();
    let cycle = AuditCycle::new(Arc::new(registry), Arc::new(DoctrineLibrary::standard()), ledger.clone());

    let case = CaseContext::new("C-045", "Hollow finding");
    let report = cycle.run(&roster(&["A7"]), Some(&case)).await.unwrap();
    assert_eq!(report.state, CycleState::Closed);
    assert!(matches!(report.invocations[0].result, InvocationResult::Failed(_)));
    assert_eq!(report.resolved, 0);
}

#[tokio::test]
async fn contradicting_reflection_is_logged_not_reinvoked() {
    let ledger = MemoryLedger::new();
    let registry = AgentRegistry::new();
    registry.register(Arc::new(Echo::new())).unwrap();
    let library = Arc::new(DoctrineLibrary::standard());
    // ECHO reflects on its own hollow finding and produces another one
    let cycle = AuditCycle::new(Arc::new(registry), library.clone(), ledger.clone()).with_settings(CycleSettings {
        reflection_agent: AgentId::from_number(7),
        ..CycleSettings::default()
    });

    let case = CaseContext::new("C-046", "Hollow finding").with_data("finding", json!(""));
    let report = cycle.run(&roster(&["A7"]), Some(&case)).await.unwrap();

    assert_eq!(report.state, CycleState::Closed);
    assert_eq!(report.invocations.len(), 1);
    assert!(matches!(
        report.invocations[0].result,
        InvocationResult::Reflected { codification: None }
    ));
    assert_eq!(report.resolved, 0);
    assert_eq!(library.version().await, "5.4.1");

    // both contradictions are on record; only the roster's was routed to a protocol
    let contradictions = ledger.contradictions().await;
    assert_eq!(contradictions.len(), 2);
    assert!(contradictions.iter().all(|c| c.source_agent().as_str() == "A7"));
    let invocation_lines = ledger
        .logs()
        .await
        .iter()
        .filter(|l| l.text.starts_with("Protocol "))
        .count();
    assert_eq!(invocation_lines, 1);
}

// ===========================================================================
// Handlers and concurrency
// ===========================================================================

#[tokio::test]
async fn handler_sees_invocations_after_they_are_recorded() {
    let ledger = MemoryLedger::new();
    let witness = Arc::new(Witness {
        ledger: ledger.clone(),
        seen: Mutex::new(Vec::new()),
        recorded_first: AtomicUsize::new(0),
    });
    let cycle = standard_cycle(&ledger).with_handler(witness.clone());
    cycle.run_case(&sentencing_case()).await.unwrap();

    let seen = witness.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, Protocol::DoctrineReview);
    assert_eq!(witness.recorded_first.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_cycles_share_one_ledger() {
    let ledger = MemoryLedger::new();
    let first = standard_cycle(&ledger);
    let second = standard_cycle(&ledger);
    let a = sentencing_case();
    let b = CaseContext::new("C-013", "Second review")
        .with_agents(&["A2"])
        .with_data("modifiers", json!([0.5, 1.4]));

    let (ra, rb) = tokio::join!(first.run_case(&a), second.run_case(&b));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_eq!(ra.contradictions().len(), 1);
    assert_eq!(rb.contradictions().len(), 1);

    let contents = ledger.contents().await;
    assert_eq!(contents.contradictions.len(), 2);
    assert_eq!(contents.snapshots.len(), 6);
    for entry in &contents.contradictions {
        let id = entry.id.to_string();
        assert!(contents.logs.iter().any(|l| l.text.starts_with("Contradiction logged:") && l.text.contains(&id)));
    }
}
