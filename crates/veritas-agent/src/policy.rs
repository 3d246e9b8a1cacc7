//! Protocol selection policy.
//!
//! Selection depends on the contradiction's category and nothing else, so the
//! same category always yields the same protocol.

use std::collections::{BTreeMap, HashMap};
use veritas_core::{ContradictionCategory, Error, Protocol, Result};

pub trait ProtocolPolicy: Send + Sync {
    fn select(&self, category: ContradictionCategory) -> Protocol;
}

/// The built-in mapping.
pub fn default_protocol(category: ContradictionCategory) -> Protocol {
    match category {
        ContradictionCategory::Logical => Protocol::ReflectionSession,
        ContradictionCategory::Doctrinal => Protocol::ReflectionSession,
        ContradictionCategory::Temporal => Protocol::TimeReversal,
        ContradictionCategory::Bias => Protocol::DoctrineReview,
        ContradictionCategory::Grief => Protocol::GriefClosureSequence,
        ContradictionCategory::Promise => Protocol::PromiseIntegrity,
        ContradictionCategory::Sovereignty => Protocol::SanctuaryLock,
        ContradictionCategory::Evidence => Protocol::WebAccess,
        ContradictionCategory::Systemic => Protocol::AuditCycle,
    }
}

/// The built-in mapping with per-category overrides.
#[derive(Clone, Debug, Default)]
pub struct CategoryPolicy {
    overrides: HashMap<ContradictionCategory, Protocol>,
}

impl CategoryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, category: ContradictionCategory, protocol: Protocol) -> Self {
        self.overrides.insert(category, protocol);
        self
    }

    /// Build from `category name -> protocol name` pairs as they appear in
    /// config. Protocol names outside the closed set are `UnknownProtocol`.
    pub fn from_names(names: &BTreeMap<String, String>) -> Result<Self> {
        let mut policy = Self::new();
        for (category, protocol) in names {
            let category = ContradictionCategory::ALL
                .iter()
                .copied()
                .find(|c| c.as_str() == category)
                .ok_or_else(|| Error::Config(format!("unknown contradiction category '{}'", category)))?;
            policy.overrides.insert(category, protocol.parse()?);
        }
        Ok(policy)
    }
}

impl ProtocolPolicy for CategoryPolicy {
    fn select(&self, category: ContradictionCategory) -> Protocol {
        self.overrides
            .get(&category)
            .copied()
            .unwrap_or_else(|| default_protocol(category))
    }
}
