// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Breaker Audit Port
// ─────────────────────────────────────────────────────────────────────
//! Observer interface for persistence/audit collaborators.
//!
//! Records are emitted only after the registry lock is released. A sink
//! error or panic is logged and dropped; it never reaches the caller of
//! the breaker operation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use homeostat_types::{HomeostatError, HomeostatResult};

use crate::event::{CircuitBreakerEvent, EventId, PhaseAdvance, RecoveryAction};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Triggered {
        event: CircuitBreakerEvent,
    },
    Escalated {
        event_id: EventId,
        level: u8,
    },
    PhaseRecorded {
        event_id: EventId,
        action: RecoveryAction,
        advance: PhaseAdvance,
    },
    FrozenSetChanged {
        event_id: EventId,
        operations: BTreeSet<String>,
    },
    Resolved {
        event_id: EventId,
        resolved_at: DateTime<Utc>,
        final_measurement: Option<f64>,
    },
}

impl AuditRecord {
    pub fn event_id(&self) -> EventId {
        match self {
            Self::Triggered { event } => event.id,
            Self::Escalated { event_id, .. }
            | Self::PhaseRecorded { event_id, .. }
            | Self::FrozenSetChanged { event_id, .. }
            | Self::Resolved { event_id, .. } => *event_id,
        }
    }
}

/// Downstream consumer of breaker state changes.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> HomeostatResult<()>;
}

/// Writes each record as one JSON line through `log`.
#[derive(Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, record: &AuditRecord) -> HomeostatResult<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| HomeostatError::Sink(format!("audit encode failed: {e}")))?;
        log::info!(target: "homeostat::audit", "{line}");
        Ok(())
    }
}

/// Keeps every record in memory, for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> HomeostatResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Best-effort fan-out to every sink.
pub(crate) fn emit(sinks: &[Arc<dyn AuditSink>], record: &AuditRecord) {
    for sink in sinks {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.record(record))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("audit sink failed for event {}: {e}", record.event_id());
            }
            Err(_) => {
                log::error!(
                    "audit sink panicked for event {}, record dropped",
                    record.event_id()
                );
            }
        }
    }
}
