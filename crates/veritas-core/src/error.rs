//! Error types for Veritas
//!
//! Contradictions are findings, not errors. Nothing in this enum represents a
//! doctrine violation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid context: {0}")]
    InvalidContext(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("recursion limit exceeded: depth {depth} > limit {limit}")]
    RecursionLimit { depth: usize, limit: usize },

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("doctrine unavailable: {0}")]
    DoctrineUnavailable(String),

    #[error("duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("invalid agent identity: {0}")]
    InvalidIdentity(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(usize),

    #[error("invalid cycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("timed out after {millis}ms: {operation}")]
    Timeout { operation: String, millis: u64 },

    #[error("cancelled after {completed} agent(s) completed")]
    Cancelled { completed: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_context(reason: impl Into<String>) -> Self {
        Self::InvalidContext(reason.into())
    }

    pub fn ledger_unavailable(reason: impl Into<String>) -> Self {
        Self::LedgerUnavailable(reason.into())
    }

    pub fn doctrine_unavailable(reason: impl Into<String>) -> Self {
        Self::DoctrineUnavailable(reason.into())
    }

    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    /// Errors that abort the whole audit cycle rather than a single agent.
    pub fn is_fatal_to_cycle(&self) -> bool {
        matches!(self, Self::RecursionLimit { .. } | Self::Cancelled { .. })
    }

    /// Short machine-readable kind, used in cycle reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidContext(_) => "invalid_context",
            Self::LedgerUnavailable(_) => "ledger_unavailable",
            Self::RecursionLimit { .. } => "recursion_limit",
            Self::UnknownProtocol(_) => "unknown_protocol",
            Self::DoctrineUnavailable(_) => "doctrine_unavailable",
            Self::DuplicateAgent(_) => "duplicate_agent",
            Self::InvalidIdentity(_) => "invalid_identity",
            Self::AgentNotFound(_) => "agent_not_found",
            Self::SnapshotNotFound(_) => "snapshot_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
