// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Seven-Phase Recovery Protocol
// ─────────────────────────────────────────────────────────────────────
//! Drives an event through `RecoveryPhase::ALL`, one executor call per
//! phase, recording each result through the breaker.
//!
//! Phases are independently re-invokable: a halted run can be retried and
//! picks up at the event's current phase.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use homeostat_types::{HomeostatError, HomeostatResult, PhasePolicy};

use crate::breaker::CircuitBreaker;
use crate::event::{CircuitBreakerEvent, EventId, PhaseAdvance, RecoveryAction, RecoveryPhase};

/// What an executor reports for one phase attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub success: bool,
    pub result: Value,
}

impl PhaseOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result,
        }
    }

    pub fn failure(result: Value) -> Self {
        Self {
            success: false,
            result,
        }
    }
}

/// External remediation callback, invoked synchronously once per phase.
pub trait ActionExecutor {
    fn execute(&self, phase: RecoveryPhase, event: &CircuitBreakerEvent) -> PhaseOutcome;
}

impl<F> ActionExecutor for F
where
    F: Fn(RecoveryPhase, &CircuitBreakerEvent) -> PhaseOutcome,
{
    fn execute(&self, phase: RecoveryPhase, event: &CircuitBreakerEvent) -> PhaseOutcome {
        self(phase, event)
    }
}

/// Fails the validation phase while coherence is still below threshold.
pub struct ValidationGate<E, P> {
    inner: E,
    probe: P,
    threshold: f64,
}

impl<E, P> ValidationGate<E, P>
where
    E: ActionExecutor,
    P: Fn() -> f64,
{
    pub fn new(inner: E, probe: P, threshold: f64) -> Self {
        Self {
            inner,
            probe,
            threshold,
        }
    }
}

impl<E, P> ActionExecutor for ValidationGate<E, P>
where
    E: ActionExecutor,
    P: Fn() -> f64,
{
    fn execute(&self, phase: RecoveryPhase, event: &CircuitBreakerEvent) -> PhaseOutcome {
        if phase == RecoveryPhase::Validation {
            let coherence = (self.probe)();
            if coherence.is_nan() || coherence < self.threshold {
                let observed = if coherence.is_finite() {
                    Value::from(coherence)
                } else {
                    Value::Null
                };
                return PhaseOutcome::failure(json!({
                    "reason": "coherence below threshold",
                    "coherence": observed,
                    "threshold": self.threshold,
                }));
            }
        }
        self.inner.execute(phase, event)
    }
}

/// One executor call. `advance` is `None` when the result was not recorded
/// because the breaker is parked at an earlier failed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAttempt {
    pub action: RecoveryAction,
    pub advance: Option<PhaseAdvance>,
}

impl PhaseAttempt {
    pub fn advanced(&self) -> bool {
        self.advance.is_some_and(PhaseAdvance::is_progress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub event_id: EventId,
    pub attempts: Vec<PhaseAttempt>,
    /// First phase that failed in this run.
    pub halted_at: Option<RecoveryPhase>,
    pub resolved: bool,
}

impl RecoveryReport {
    pub fn success_flags(&self) -> Vec<(RecoveryPhase, bool)> {
        self.attempts
            .iter()
            .map(|a| (a.action.phase, a.action.success))
            .collect()
    }
}

pub struct RecoveryProtocol<'a> {
    breaker: &'a CircuitBreaker,
    policy: PhasePolicy,
}

impl<'a> RecoveryProtocol<'a> {
    pub fn new(breaker: &'a CircuitBreaker, policy: PhasePolicy) -> Self {
        Self { breaker, policy }
    }

    /// Execute the event's current phase once and record the result.
    pub fn run_phase(
        &self,
        id: &EventId,
        executor: &dyn ActionExecutor,
    ) -> HomeostatResult<PhaseAttempt> {
        let (event, phase) = self.open_event(id)?;
        let outcome = execute_guarded(executor, phase, &event);
        let action = RecoveryAction::new(phase, outcome.success, outcome.result);
        let advance = self.breaker.advance_recovery_phase(id, action.clone())?;
        Ok(PhaseAttempt {
            action,
            advance: Some(advance),
        })
    }

    /// Walk from the event's current phase through resumption.
    pub fn run_full_recovery(
        &self,
        id: &EventId,
        executor: &dyn ActionExecutor,
    ) -> HomeostatResult<RecoveryReport> {
        let (_, start) = self.open_event(id)?;
        let mut report = RecoveryReport {
            event_id: *id,
            attempts: Vec::new(),
            halted_at: None,
            resolved: false,
        };

        for phase in RecoveryPhase::ALL.into_iter().filter(|p| *p >= start) {
            if report.halted_at.is_some() {
                // Best effort past a failure: collect the payload only.
                let event = self
                    .breaker
                    .get_event(id)
                    .ok_or_else(|| HomeostatError::UnknownEvent(id.to_string()))?;
                let outcome = execute_guarded(executor, phase, &event);
                report.attempts.push(PhaseAttempt {
                    action: RecoveryAction::new(phase, outcome.success, outcome.result),
                    advance: None,
                });
                continue;
            }

            let attempt = self.run_phase(id, executor)?;
            let advance = attempt.advance;
            report.attempts.push(attempt);
            match advance {
                Some(PhaseAdvance::Held(held)) => {
                    log::warn!("recovery of event {id} halted at phase {held}");
                    report.halted_at = Some(held);
                    if self.policy == PhasePolicy::HaltOnFailure {
                        break;
                    }
                }
                Some(PhaseAdvance::Resolved) => report.resolved = true,
                _ => {}
            }
        }
        Ok(report)
    }

    fn open_event(&self, id: &EventId) -> HomeostatResult<(CircuitBreakerEvent, RecoveryPhase)> {
        let event = self
            .breaker
            .get_event(id)
            .ok_or_else(|| HomeostatError::UnknownEvent(id.to_string()))?;
        let phase = event.recovery_phase.ok_or_else(|| {
            HomeostatError::InvalidTransition(format!("event {id} is resolved"))
        })?;
        Ok((event, phase))
    }
}

/// A panicking executor is a failed phase.
fn execute_guarded(
    executor: &dyn ActionExecutor,
    phase: RecoveryPhase,
    event: &CircuitBreakerEvent,
) -> PhaseOutcome {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        executor.execute(phase, event)
    })) {
        Ok(outcome) => outcome,
        Err(_) => {
            log::error!("recovery executor panicked in phase {phase} of event {}", event.id);
            PhaseOutcome::failure(json!({ "error": "executor panicked" }))
        }
    }
}
