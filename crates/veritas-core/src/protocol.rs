//! Protocol registry — the closed set of remediation and ritual actions.
//!
//! Protocols are doctrine-level constants, not plugins. Adding one means adding
//! a variant here; every `match` over `Protocol` is then flagged by the compiler.
//!
//! Wire names are the PascalCase variant names:
//!
//!   "MirrorClause", "DoctrineReview", "TimeReversal", "AuditCycle",
//!   "ReflectionSession", "WebAccess", "GriefClosureSequence",
//!   "PromiseIntegrity", "SanctuaryLock"

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named protocol an audit cycle may invoke.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    MirrorClause,
    DoctrineReview,
    TimeReversal,
    AuditCycle,
    ReflectionSession,
    WebAccess,
    GriefClosureSequence,
    PromiseIntegrity,
    SanctuaryLock,
}

impl Protocol {
    /// Every protocol, in registry order.
    pub const ALL: [Protocol; 9] = [
        Protocol::MirrorClause,
        Protocol::DoctrineReview,
        Protocol::TimeReversal,
        Protocol::AuditCycle,
        Protocol::ReflectionSession,
        Protocol::WebAccess,
        Protocol::GriefClosureSequence,
        Protocol::PromiseIntegrity,
        Protocol::SanctuaryLock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::MirrorClause => "MirrorClause",
            Self::DoctrineReview => "DoctrineReview",
            Self::TimeReversal => "TimeReversal",
            Self::AuditCycle => "AuditCycle",
            Self::ReflectionSession => "ReflectionSession",
            Self::WebAccess => "WebAccess",
            Self::GriefClosureSequence => "GriefClosureSequence",
            Self::PromiseIntegrity => "PromiseIntegrity",
            Self::SanctuaryLock => "SanctuaryLock",
        }
    }

    /// Protocols that re-enter the audit machinery when invoked.
    pub fn is_reentrant(&self) -> bool {
        matches!(self, Self::AuditCycle | Self::ReflectionSession)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::UnknownProtocol(s.to_string()))
    }
}

/// Read-only view over the closed protocol set.
pub struct ProtocolRegistry;

impl ProtocolRegistry {
    pub fn contains(name: &str) -> bool {
        name.parse::<Protocol>().is_ok()
    }

    /// Resolve a name, failing with `UnknownProtocol` outside the closed set.
    pub fn resolve(name: &str) -> crate::Result<Protocol> {
        name.parse()
    }

    pub fn iter() -> impl Iterator<Item = Protocol> {
        Protocol::ALL.into_iter()
    }

    pub fn names() -> Vec<&'static str> {
        Protocol::ALL.iter().map(|p| p.name()).collect()
    }

    pub fn len() -> usize {
        Protocol::ALL.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for p in ProtocolRegistry::iter() {
            assert_eq!(p.name().parse::<Protocol>().unwrap(), p);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "Exorcism".parse::<Protocol>().unwrap_err();
        assert!(matches!(err, Error::UnknownProtocol(ref n) if n == "Exorcism"));
        assert!(!ProtocolRegistry::contains("reflectionsession"));
    }

    #[test]
    fn serde_uses_variant_names() {
        let json = serde_json::to_string(&Protocol::GriefClosureSequence).unwrap();
        assert_eq!(json, r#""GriefClosureSequence""#);
    }

    #[test]
    fn reentrant_protocols() {
        let reentrant: Vec<_> = ProtocolRegistry::iter().filter(|p| p.is_reentrant()).collect();
        assert_eq!(reentrant, vec![Protocol::AuditCycle, Protocol::ReflectionSession]);
    }
}
