//! Core types for Veritas

use crate::error::{Error, Result};
use crate::protocol::Protocol;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Agent identifier (`A<number>`) - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(Arc<str>);

impl AgentId {
    /// Parse an id of the form `A<number>`.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let digits = s.strip_prefix('A').unwrap_or("");
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidIdentity(format!(
                "agent id must look like A<number>, got '{}'",
                s
            )));
        }
        Ok(Self(Arc::from(s)))
    }

    pub fn from_number(n: u32) -> Self {
        Self(Arc::from(format!("A{}", n)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of the id (`A10` → 10).
    pub fn number(&self) -> u32 {
        self.0[1..].parse().unwrap_or(0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AgentId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0.to_string()
    }
}

/// Contradiction severity
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Doctrine category a contradiction falls under. Protocol selection is a
/// function of this value alone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContradictionCategory {
    Logical,
    Doctrinal,
    Temporal,
    Bias,
    Grief,
    Promise,
    Sovereignty,
    Evidence,
    Systemic,
}

impl ContradictionCategory {
    pub const ALL: [ContradictionCategory; 9] = [
        Self::Logical,
        Self::Doctrinal,
        Self::Temporal,
        Self::Bias,
        Self::Grief,
        Self::Promise,
        Self::Sovereignty,
        Self::Evidence,
        Self::Systemic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logical => "logical",
            Self::Doctrinal => "doctrinal",
            Self::Temporal => "temporal",
            Self::Bias => "bias",
            Self::Grief => "grief",
            Self::Promise => "promise",
            Self::Sovereignty => "sovereignty",
            Self::Evidence => "evidence",
            Self::Systemic => "systemic",
        }
    }
}

impl fmt::Display for ContradictionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A doctrine violation found by the Mirror Clause.
///
/// Identity and timestamp are assigned by the ledger when the record is
/// logged; this value is what the checker produces and is fully determined by
/// the outcome and doctrine snapshot it was checked against.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contradiction {
    pub summary: String,
    pub invariant: String,
    pub category: ContradictionCategory,
    pub severity: Severity,
    pub source_agent: AgentId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doctrinal_refs: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<Protocol>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

impl Contradiction {
    pub fn new(
        source_agent: AgentId,
        invariant: impl Into<String>,
        category: ContradictionCategory,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            invariant: invariant.into(),
            category,
            severity: Severity::Medium,
            source_agent,
            doctrinal_refs: Vec::new(),
            recommended: None,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_refs(mut self, refs: Vec<u32>) -> Self {
        self.doctrinal_refs = refs;
        self
    }

    pub fn with_recommendation(mut self, protocol: Protocol) -> Self {
        self.recommended = Some(protocol);
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Case lifecycle status
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    #[default]
    Open,
    InReflection,
    Resolved,
}

/// The context an agent processes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseContext {
    pub id: String,
    pub summary: String,
    #[serde(default)]
    pub involved_agents: Vec<String>,
    #[serde(default)]
    pub books_applied: Vec<u32>,
    #[serde(default)]
    pub status: CaseStatus,
    #[serde(default)]
    pub contradictions: Vec<Contradiction>,
    #[serde(default)]
    pub timeline: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl CaseContext {
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            involved_agents: Vec::new(),
            books_applied: Vec::new(),
            status: CaseStatus::Open,
            contradictions: Vec::new(),
            timeline: Vec::new(),
            data: serde_json::Map::new(),
        }
    }

    /// Validate caller-supplied input. A null or non-object value, or one
    /// missing `id`/`summary`, is an `InvalidContext`.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let obj = match &value {
            serde_json::Value::Null => return Err(Error::invalid_context("context is null")),
            serde_json::Value::Object(obj) => obj,
            other => {
                return Err(Error::invalid_context(format!(
                    "context must be an object, got {}",
                    json_kind(other)
                )))
            }
        };
        for field in ["id", "summary"] {
            match obj.get(field) {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {}
                _ => {
                    return Err(Error::invalid_context(format!(
                        "missing required field '{}'",
                        field
                    )))
                }
            }
        }
        serde_json::from_value(value).map_err(|e| Error::invalid_context(e.to_string()))
    }

    pub fn with_agents(mut self, agents: &[&str]) -> Self {
        self.involved_agents = agents.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_books(mut self, books: Vec<u32>) -> Self {
        self.books_applied = books;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Copy of this case carrying an additional contradiction, in reflection.
    pub fn reflecting_on(&self, contradiction: &Contradiction) -> Self {
        let mut case = self.clone();
        case.contradictions.push(contradiction.clone());
        case.status = CaseStatus::InReflection;
        case
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// What an agent produced for a case. Consumed immediately by the Mirror Clause.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    pub agent: AgentId,
    pub case_id: String,
    pub summary: String,
    #[serde(default)]
    pub actions: Vec<String>,
    /// Books the outcome relies on.
    #[serde(default)]
    pub doctrinal_refs: Vec<u32>,
    /// Agent-specific shape.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Outcome {
    pub fn new(agent: AgentId, case_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            agent,
            case_id: case_id.into(),
            summary: summary.into(),
            actions: Vec::new(),
            doctrinal_refs: Vec::new(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_refs(mut self, refs: Vec<u32>) -> Self {
        self.doctrinal_refs = refs;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Numeric payload field, if present.
    pub fn payload_f64(&self, key: &str) -> Option<f64> {
        self.payload.get(key).and_then(|v| v.as_f64())
    }

    pub fn payload_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(|v| v.as_bool())
    }
}

/// How much of the web an agent may reach.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebAccess {
    Full,
    Relay,
    #[default]
    None,
}
