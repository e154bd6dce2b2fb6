// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Circuit Breaker Records
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use homeostat_types::HomeostatError;

/// Maximum escalation level of a single event.
pub const MAX_ESCALATION: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle of one breaker event. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Active,
    Recovering,
    Resolved,
}

impl EventStatus {
    /// Active or recovering: the event still freezes operations.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

/// The seven ordered recovery phases. Persisted as the phase number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RecoveryPhase {
    Assessment = 1,
    Isolation = 2,
    Stabilization = 3,
    Diagnosis = 4,
    Remediation = 5,
    Validation = 6,
    Resumption = 7,
}

impl RecoveryPhase {
    pub const ALL: [RecoveryPhase; 7] = [
        Self::Assessment,
        Self::Isolation,
        Self::Stabilization,
        Self::Diagnosis,
        Self::Remediation,
        Self::Validation,
        Self::Resumption,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    /// Action type recorded for this phase.
    pub fn action_type(self) -> &'static str {
        match self {
            Self::Assessment => "assessment",
            Self::Isolation => "isolation",
            Self::Stabilization => "stabilization",
            Self::Diagnosis => "diagnosis",
            Self::Remediation => "remediation",
            Self::Validation => "validation",
            Self::Resumption => "resumption",
        }
    }

    /// Following phase, `None` after resumption.
    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn is_last(self) -> bool {
        self == Self::Resumption
    }
}

impl From<RecoveryPhase> for u8 {
    fn from(phase: RecoveryPhase) -> u8 {
        phase.number()
    }
}

impl TryFrom<u8> for RecoveryPhase {
    type Error = HomeostatError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| {
            HomeostatError::InvalidParameter(format!("recovery phase must be 1..=7, got {n}"))
        })
    }
}

impl fmt::Display for RecoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.action_type())
    }
}

/// One executed recovery phase. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub phase: RecoveryPhase,
    pub action_type: String,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub result: Value,
}

impl RecoveryAction {
    pub fn new(phase: RecoveryPhase, success: bool, result: Value) -> Self {
        Self {
            phase,
            action_type: phase.action_type().to_string(),
            executed_at: Utc::now(),
            success,
            result,
        }
    }
}

/// A tripped breaker: what froze, how far it escalated, where recovery is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerEvent {
    pub id: EventId,
    pub trigger_measurement: f64,
    pub threshold: f64,
    pub frozen_operations: BTreeSet<String>,
    /// 1 on trigger, capped at [`MAX_ESCALATION`].
    pub escalation_level: u8,
    pub status: EventStatus,
    /// `None` once resolved.
    pub recovery_phase: Option<RecoveryPhase>,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
    pub recovery_history: Vec<RecoveryAction>,
}

impl CircuitBreakerEvent {
    pub(crate) fn open(
        trigger_measurement: f64,
        threshold: f64,
        frozen_operations: BTreeSet<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: EventId::new(),
            trigger_measurement,
            threshold,
            frozen_operations,
            escalation_level: 1,
            status: EventStatus::Active,
            recovery_phase: Some(RecoveryPhase::Assessment),
            triggered_at: Utc::now(),
            resolved_at: None,
            metadata,
            recovery_history: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// Where a coherence value sits relative to the breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceBand {
    /// Below the panic threshold: the breaker trips.
    Panic,
    /// Below the review threshold.
    Review,
    Nominal,
}

/// Result of recording one phase action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "phase")]
pub enum PhaseAdvance {
    /// Phase succeeded; the event moved to the contained phase.
    Advanced(RecoveryPhase),
    /// Resumption succeeded; the event is resolved.
    Resolved,
    /// Phase failed; the event stays at the contained phase.
    Held(RecoveryPhase),
}

impl PhaseAdvance {
    pub fn is_progress(self) -> bool {
        !matches!(self, Self::Held(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_table_order() {
        let numbers: Vec<u8> = RecoveryPhase::ALL.iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(RecoveryPhase::Assessment.next(), Some(RecoveryPhase::Isolation));
        assert_eq!(RecoveryPhase::Resumption.next(), None);
        assert!(RecoveryPhase::Resumption.is_last());
    }

    #[test]
    fn test_from_number_bounds() {
        assert_eq!(RecoveryPhase::from_number(0), None);
        assert_eq!(RecoveryPhase::from_number(6), Some(RecoveryPhase::Validation));
        assert_eq!(RecoveryPhase::from_number(8), None);
    }

    #[test]
    fn test_action_types() {
        let types: Vec<&str> = RecoveryPhase::ALL.iter().map(|p| p.action_type()).collect();
        assert_eq!(
            types,
            vec![
                "assessment",
                "isolation",
                "stabilization",
                "diagnosis",
                "remediation",
                "validation",
                "resumption"
            ]
        );
    }

    #[test]
    fn test_new_event_defaults() {
        let ops: BTreeSet<String> = ["coin_mint".to_string()].into_iter().collect();
        let ev = CircuitBreakerEvent::open(0.25, 0.3, ops.clone(), Map::new());
        assert_eq!(ev.status, EventStatus::Active);
        assert_eq!(ev.escalation_level, 1);
        assert_eq!(ev.recovery_phase, Some(RecoveryPhase::Assessment));
        assert_eq!(ev.frozen_operations, ops);
        assert!(ev.resolved_at.is_none());
        assert!(ev.is_open());
    }

    #[test]
    fn test_event_serializes_status() {
        let ev = CircuitBreakerEvent::open(0.1, 0.3, BTreeSet::new(), Map::new());
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["recovery_phase"], 1);
        assert_eq!(json["id"], ev.id.to_string());
    }

    #[test]
    fn test_phase_persisted_as_number() {
        assert_eq!(serde_json::to_value(RecoveryPhase::Validation).unwrap(), 6);
        let phase: RecoveryPhase = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!(phase, RecoveryPhase::Stabilization);
        assert!(serde_json::from_value::<RecoveryPhase>(serde_json::json!(0)).is_err());
        assert!(serde_json::from_value::<RecoveryPhase>(serde_json::json!(8)).is_err());

        let resolved = CircuitBreakerEvent {
            recovery_phase: None,
            ..CircuitBreakerEvent::open(0.1, 0.3, BTreeSet::new(), Map::new())
        };
        let json = serde_json::to_value(&resolved).unwrap();
        assert!(json["recovery_phase"].is_null());
        let back: CircuitBreakerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.recovery_phase, None);
    }

    #[test]
    fn test_event_ids_unique() {
        assert_ne!(EventId::new(), EventId::new());
    }
}
