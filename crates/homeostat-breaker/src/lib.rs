// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Constitutional Circuit Breaker
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Safety interlock for coherence collapse.
//!
//! - [`breaker`]: event registry and the trigger/escalate/advance/resolve
//!   state machine
//! - [`recovery`]: ordered seven-phase remediation driven through the
//!   breaker
//! - [`audit`]: best-effort observer port for persistence collaborators
//! - [`event`]: the records shared by all of the above

pub mod audit;
pub mod breaker;
pub mod event;
pub mod recovery;

pub use audit::{AuditRecord, AuditSink, LogAuditSink, MemoryAuditSink};
pub use breaker::CircuitBreaker;
pub use event::{
    CircuitBreakerEvent, CoherenceBand, EventId, EventStatus, PhaseAdvance, RecoveryAction,
    RecoveryPhase, MAX_ESCALATION,
};
pub use recovery::{
    ActionExecutor, PhaseAttempt, PhaseOutcome, RecoveryProtocol, RecoveryReport, ValidationGate,
};
