//! Veritas Ledger — the append-only record of logs, contradictions, and snapshots.
//!
//! One `MemoryLedger` is constructed per process and handed to every agent and
//! audit cycle by handle. Appends are serialized behind a single write lock, so
//! a contradiction and its derived log line become visible together. A durable
//! `LedgerSink` sees every record before it is committed in memory.

pub mod ledger;
pub mod metrics;
pub mod sink;

pub use ledger::{ContradictionEntry, LedgerContents, LedgerView, LogEntry, MemoryLedger, Snapshot};
pub use metrics::LedgerMetrics;
pub use sink::{DurableRecord, JsonlSink, LedgerRecord, LedgerSink, NullSink};
