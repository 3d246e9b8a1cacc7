//! Veritas configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists or it cannot be parsed.

use crate::policy::CategoryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use veritas_core::{AgentId, Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VeritasConfig {
    pub audit: AuditConfig,
    pub ledger: LedgerConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Deepest nested audit cycle allowed. The root cycle is depth 1.
    pub max_nesting_depth: usize,
    /// Upper bound on a single agent's process + Mirror Clause step.
    pub agent_timeout_ms: u64,
    /// Agent re-invoked by `ReflectionSession`.
    pub reflection_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSONL file mirroring the ledger. In-memory only when unset.
    pub path: Option<PathBuf>,
    pub sink_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Contradiction category (`bias`, `grief`, ...) to protocol name.
    pub overrides: BTreeMap<String, String>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 5,
            agent_timeout_ms: 30_000,
            reflection_agent: "A10".into(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { path: None, sink_timeout_ms: 5_000 }
    }
}

// ============================================================
// Loading
// ============================================================

impl VeritasConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject settings the audit cycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audit.max_nesting_depth == 0 {
            return Err(Error::Config("audit.max_nesting_depth must be at least 1".into()));
        }
        if self.audit.agent_timeout_ms == 0 || self.ledger.sink_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }
        self.reflection_agent()?;
        self.policy()?;
        Ok(())
    }

    pub fn reflection_agent(&self) -> Result<AgentId> {
        AgentId::parse(self.audit.reflection_agent.as_str())
            .map_err(|e| Error::Config(format!("audit.reflection_agent: {}", e)))
    }

    pub fn policy(&self) -> Result<CategoryPolicy> {
        CategoryPolicy::from_names(&self.policy.overrides)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.audit.agent_timeout_ms)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger.sink_timeout_ms)
    }
}
