//! The in-memory ledger and its read-only view.

use crate::sink::{LedgerRecord, LedgerSink, NullSink};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;
use veritas_core::{AgentId, Contradiction, Error, Result};

const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// A timestamped log line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub seq: usize,
    pub recorded_at: DateTime<Utc>,
    pub text: String,
}

impl LogEntry {
    /// The line as written: `[<ISO-8601>] <text>`.
    pub fn line(&self) -> String {
        format!(
            "[{}] {}",
            self.recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.text
        )
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// A contradiction as recorded. Immutable once appended.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ContradictionEntry {
    pub seq: usize,
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub contradiction: Contradiction,
}

impl ContradictionEntry {
    pub fn source_agent(&self) -> &AgentId {
        &self.contradiction.source_agent
    }

    pub fn summary(&self) -> &str {
        &self.contradiction.summary
    }
}

/// A point-in-time marker: how long each sequence was when it was taken.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub index: usize,
    pub label: String,
    pub taken_at: DateTime<Utc>,
    pub log_len: usize,
    pub contradiction_len: usize,
}

/// All three sequences, read under one lock.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LedgerContents {
    pub logs: Vec<LogEntry>,
    pub contradictions: Vec<ContradictionEntry>,
    pub snapshots: Vec<Snapshot>,
}

#[derive(Default)]
struct LedgerState {
    logs: Vec<LogEntry>,
    contradictions: Vec<ContradictionEntry>,
    snapshots: Vec<Snapshot>,
    closed: bool,
}

impl LedgerState {
    fn snapshot_at(&self, index: usize) -> Result<&Snapshot> {
        self.snapshots.get(index).ok_or(Error::SnapshotNotFound(index))
    }
}

struct LedgerInner {
    state: RwLock<LedgerState>,
    sink: Arc<dyn LedgerSink>,
    sink_timeout: Duration,
}

/// Append-only ledger handle. Clones share the same ledger.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// A ledger with no durable backing.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(NullSink), DEFAULT_SINK_TIMEOUT)
    }

    pub fn with_sink(sink: Arc<dyn LedgerSink>, sink_timeout: Duration) -> Self {
        info!(location = %sink.location(), "ledger opened");
        Self {
            inner: Arc::new(LedgerInner {
                state: RwLock::new(LedgerState::default()),
                sink,
                sink_timeout,
            }),
        }
    }

    /// Read-only handle for agents.
    pub fn view(&self) -> LedgerView {
        LedgerView {
            ledger: self.clone(),
        }
    }

    pub fn location(&self) -> String {
        self.inner.sink.location()
    }

    /// Append a log line stamped with the current time.
    pub async fn write(&self, entry: impl Into<String>) -> Result<LogEntry> {
        let mut state = self.inner.state.write().await;
        ensure_open(&state)?;
        let log = LogEntry {
            seq: state.logs.len(),
            recorded_at: Utc::now(),
            text: entry.into(),
        };
        self.persist(&LedgerRecord::Log(log.clone())).await?;
        state.logs.push(log.clone());
        debug!(seq = log.seq, "ledger write");
        Ok(log)
    }

    /// Append a contradiction together with its derived log line. Both become
    /// visible under the same write lock, or neither does.
    pub async fn log_contradiction(&self, contradiction: Contradiction) -> Result<ContradictionEntry> {
        let mut state = self.inner.state.write().await;
        ensure_open(&state)?;
        let recorded_at = Utc::now();
        let entry = ContradictionEntry {
            seq: state.contradictions.len(),
            id: Uuid::new_v4(),
            recorded_at,
            contradiction,
        };
        let log = LogEntry {
            seq: state.logs.len(),
            recorded_at,
            text: format!(
                "Contradiction logged: {} (agent {}, invariant {}, id {})",
                entry.contradiction.summary,
                entry.contradiction.source_agent,
                entry.contradiction.invariant,
                entry.id
            ),
        };
        self.persist(&LedgerRecord::Contradiction {
            entry: entry.clone(),
            log: log.clone(),
        })
        .await?;
        state.contradictions.push(entry.clone());
        state.logs.push(log);
        info!(
            id = %entry.id,
            agent = %entry.contradiction.source_agent,
            category = %entry.contradiction.category,
            "contradiction logged"
        );
        Ok(entry)
    }

    /// Record the current sequence lengths as a named marker.
    pub async fn snapshot(&self, label: impl Into<String>) -> Result<Snapshot> {
        let mut state = self.inner.state.write().await;
        ensure_open(&state)?;
        let snapshot = Snapshot {
            index: state.snapshots.len(),
            label: label.into(),
            taken_at: Utc::now(),
            log_len: state.logs.len(),
            contradiction_len: state.contradictions.len(),
        };
        self.persist(&LedgerRecord::Snapshot(snapshot.clone())).await?;
        state.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Flush the sink and refuse further appends. Reads keep working.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.inner.state.write().await;
        if state.closed {
            return Ok(());
        }
        let millis = self.inner.sink_timeout.as_millis() as u64;
        tokio::time::timeout(self.inner.sink_timeout, self.inner.sink.flush())
            .await
            .map_err(|_| Error::timeout("ledger sink flush", millis))??;
        state.closed = true;
        info!(
            logs = state.logs.len(),
            contradictions = state.contradictions.len(),
            snapshots = state.snapshots.len(),
            "ledger closed"
        );
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.read().await.closed
    }

    async fn persist(&self, record: &LedgerRecord) -> Result<()> {
        let millis = self.inner.sink_timeout.as_millis() as u64;
        tokio::time::timeout(self.inner.sink_timeout, self.inner.sink.append(record))
            .await
            .map_err(|_| Error::timeout("ledger sink append", millis))?
    }

    // --- reads -----------------------------------------------------------

    /// A consistent copy of the whole ledger.
    pub async fn contents(&self) -> LedgerContents {
        let state = self.inner.state.read().await;
        LedgerContents {
            logs: state.logs.clone(),
            contradictions: state.contradictions.clone(),
            snapshots: state.snapshots.clone(),
        }
    }

    pub async fn logs(&self) -> Vec<LogEntry> {
        self.inner.state.read().await.logs.clone()
    }

    pub async fn contradictions(&self) -> Vec<ContradictionEntry> {
        self.inner.state.read().await.contradictions.clone()
    }

    pub async fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.state.read().await.snapshots.clone()
    }

    pub async fn log_len(&self) -> usize {
        self.inner.state.read().await.logs.len()
    }

    pub async fn contradiction_len(&self) -> usize {
        self.inner.state.read().await.contradictions.len()
    }

    /// Logs as they stood when snapshot `index` was taken.
    pub async fn logs_as_of(&self, index: usize) -> Result<Vec<LogEntry>> {
        let state = self.inner.state.read().await;
        let snap = state.snapshot_at(index)?;
        Ok(state.logs[..snap.log_len].to_vec())
    }

    pub async fn contradictions_as_of(&self, index: usize) -> Result<Vec<ContradictionEntry>> {
        let state = self.inner.state.read().await;
        let snap = state.snapshot_at(index)?;
        Ok(state.contradictions[..snap.contradiction_len].to_vec())
    }

    /// Logs appended after snapshot `index`, in insertion order.
    pub async fn logs_since(&self, index: usize) -> Result<Vec<LogEntry>> {
        let state = self.inner.state.read().await;
        let snap = state.snapshot_at(index)?;
        Ok(state.logs[snap.log_len..].to_vec())
    }

    pub async fn contradictions_since(&self, index: usize) -> Result<Vec<ContradictionEntry>> {
        let state = self.inner.state.read().await;
        let snap = state.snapshot_at(index)?;
        Ok(state.contradictions[snap.contradiction_len..].to_vec())
    }

    /// Logs appended between two snapshots (`from` inclusive, `to` exclusive).
    pub async fn logs_between(&self, from: usize, to: usize) -> Result<Vec<LogEntry>> {
        let state = self.inner.state.read().await;
        let start = state.snapshot_at(from)?.log_len;
        let end = state.snapshot_at(to)?.log_len;
        Ok(state.logs[start.min(end)..end].to_vec())
    }

    pub async fn contradictions_between(
        &self,
        from: usize,
        to: usize,
    ) -> Result<Vec<ContradictionEntry>> {
        let state = self.inner.state.read().await;
        let start = state.snapshot_at(from)?.contradiction_len;
        let end = state.snapshot_at(to)?.contradiction_len;
        Ok(state.contradictions[start.min(end)..end].to_vec())
    }
}

fn ensure_open(state: &LedgerState) -> Result<()> {
    if state.closed {
        return Err(Error::ledger_unavailable("ledger is closed"));
    }
    Ok(())
}

/// Read-only ledger access. Agents get this, never the writer.
#[derive(Clone)]
pub struct LedgerView {
    ledger: MemoryLedger,
}

impl LedgerView {
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.ledger.logs().await
    }

    pub async fn contradictions(&self) -> Vec<ContradictionEntry> {
        self.ledger.contradictions().await
    }

    pub async fn snapshots(&self) -> Vec<Snapshot> {
        self.ledger.snapshots().await
    }

    pub async fn log_len(&self) -> usize {
        self.ledger.log_len().await
    }

    pub async fn contradiction_len(&self) -> usize {
        self.ledger.contradiction_len().await
    }

    pub async fn logs_since(&self, index: usize) -> Result<Vec<LogEntry>> {
        self.ledger.logs_since(index).await
    }

    pub async fn contradictions_since(&self, index: usize) -> Result<Vec<ContradictionEntry>> {
        self.ledger.contradictions_since(index).await
    }

    /// Contradictions previously raised against `agent`.
    pub async fn contradictions_for(&self, agent: &AgentId) -> Vec<ContradictionEntry> {
        self.ledger
            .contradictions()
            .await
            .into_iter()
            .filter(|c| c.source_agent() == agent)
            .collect()
    }
}
