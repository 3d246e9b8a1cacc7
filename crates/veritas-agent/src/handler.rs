//! Protocol handlers — the subsystems a protocol invocation calls out to.
//!
//! The audit cycle records every invocation in the ledger before a handler
//! sees it. Handlers receive the protocol name and the triggering
//! contradiction, nothing more.

use tracing::info;
use veritas_core::{Protocol, Result};
use veritas_ledger::ContradictionEntry;

#[async_trait::async_trait]
pub trait ProtocolHandler: Send + Sync {
    async fn on_invoke(&self, protocol: Protocol, entry: &ContradictionEntry) -> Result<()>;
}

/// Emits a tracing event per invocation and does nothing else.
pub struct LoggingHandler;

#[async_trait::async_trait]
impl ProtocolHandler for LoggingHandler {
    async fn on_invoke(&self, protocol: Protocol, entry: &ContradictionEntry) -> Result<()> {
        info!(
            protocol = %protocol,
            contradiction = %entry.id,
            agent = %entry.source_agent(),
            severity = %entry.contradiction.severity,
            "protocol invoked"
        );
        Ok(())
    }
}
