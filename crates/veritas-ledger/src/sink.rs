//! Durable backing for the ledger — pluggable, append-only.
//!
//! The ledger writes every record here before committing it in memory. Today:
//! nothing, or a local JSON-lines file. The storage contract is append order
//! plus one record per call.

use crate::ledger::{ContradictionEntry, LogEntry, Snapshot};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;
use veritas_core::{Error, Result};

/// One atomic unit of ledger persistence.
///
/// A contradiction travels together with its derived log line so a durable
/// reader never sees one without the other.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerRecord {
    Log(LogEntry),
    Contradiction {
        entry: ContradictionEntry,
        log: LogEntry,
    },
    Snapshot(Snapshot),
}

/// Pluggable ledger backend. The ledger appends here; the backend decides where it goes.
#[async_trait::async_trait]
pub trait LedgerSink: Send + Sync {
    /// Persist one record. Failure must leave nothing half-written that a
    /// reader of this sink would accept.
    async fn append(&self, record: &LedgerRecord) -> Result<()>;

    /// Push buffered records to stable storage.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Physical location, for human inspection.
    fn location(&self) -> String;
}

/// In-memory only.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl LedgerSink for NullSink {
    async fn append(&self, _record: &LedgerRecord) -> Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}

/// One line of a JSONL ledger file.
///
/// `seq` values restart in every process that opens the ledger, so each line
/// carries the id of the run that wrote it. `(run, seq)` is unique across runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DurableRecord {
    pub run: Uuid,
    pub record: LedgerRecord,
}

struct JsonlFile {
    file: Option<tokio::fs::File>,
    /// The file may end in a torn line, from a failed append or an earlier process.
    torn: bool,
}

/// Local JSON-lines file, opened in append mode.
///
/// `append` returns only after the line has been handed to the OS: the bytes
/// are written and the buffer flushed, so a write error surfaces on the record
/// that caused it. A future dropped mid-append (timeout, cancellation) may
/// still leave its line on disk without the ledger committing it; readers see
/// that as an uncommitted tail, never as a torn record.
pub struct JsonlSink {
    path: PathBuf,
    run: Uuid,
    state: Mutex<JsonlFile>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            run: Uuid::new_v4(),
            state: Mutex::new(JsonlFile { file: None, torn: false }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id stamped on every line this sink writes.
    pub fn run(&self) -> Uuid {
        self.run
    }

    /// Read every complete record back in append order. Torn lines left by a
    /// failed append are skipped.
    pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<DurableRecord>> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let mut records = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), line = n + 1, error = %e, "skipping torn ledger line"),
            }
        }
        Ok(records)
    }

    async fn open(&self) -> std::io::Result<tokio::fs::File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
    }

    /// Whether an existing file stops partway through a line.
    async fn ends_mid_line(&self) -> std::io::Result<bool> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if file.metadata().await?.len() == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] != b'\n')
    }

    fn unavailable(&self, e: std::io::Error) -> Error {
        Error::ledger_unavailable(format!("{}: {}", self.path.display(), e))
    }
}

#[async_trait::async_trait]
impl LedgerSink for JsonlSink {
    async fn append(&self, record: &LedgerRecord) -> Result<()> {
        let line = serde_json::to_string(&DurableRecord { run: self.run, record: record.clone() })?;
        let mut state = self.state.lock().await;

        let mut file = match state.file.take() {
            Some(file) => file,
            None => {
                if self.ends_mid_line().await.unwrap_or(false) {
                    state.torn = true;
                }
                self.open().await.map_err(|e| self.unavailable(e))?
            }
        };
        // A torn tail is terminated before the next record.
        let mut bytes = String::with_capacity(line.len() + 2);
        if state.torn {
            bytes.push('\n');
        }
        bytes.push_str(&line);
        bytes.push('\n');

        // Stays set if this append fails or is dropped before it completes.
        state.torn = true;
        let written = match file.write_all(bytes.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                state.file = Some(file);
                state.torn = false;
                debug!(path = %self.path.display(), bytes = bytes.len(), "ledger record appended");
                Ok(())
            }
            Err(e) => {
                // The handle is dropped; the next append reopens the file.
                warn!(path = %self.path.display(), error = %e, "ledger append failed");
                Err(self.unavailable(e))
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(file) = state.file.as_mut() {
            file.flush().await.map_err(|e| Error::ledger_unavailable(e.to_string()))?;
            file.sync_all().await.map_err(|e| Error::ledger_unavailable(e.to_string()))?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
