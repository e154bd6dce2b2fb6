// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Coherence Governor
// ─────────────────────────────────────────────────────────────────────
//! Per-tick driver tying guidance to the safety interlock.
//!
//! Each tick updates the adaptive controller first, then checks the
//! breaker. A panic-band measurement opens a new event when none is open,
//! otherwise it escalates the most recent open event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use homeostat_breaker::{
    ActionExecutor, CircuitBreaker, CircuitBreakerEvent, CoherenceBand, EventId, RecoveryProtocol,
    RecoveryReport, ValidationGate,
};
use homeostat_control::{AdaptiveController, AdaptiveStatus, GuidanceReport, PerformanceMetrics};
use homeostat_types::{require_unit, HomeostatConfig, HomeostatError, HomeostatResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernorMode {
    Operational,
    PanicMode,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub guidance: GuidanceReport,
    pub band: CoherenceBand,
    /// Event opened by this tick.
    pub triggered: Option<CircuitBreakerEvent>,
    /// Event escalated by this tick (post-escalation snapshot).
    pub escalated: Option<CircuitBreakerEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorStatus {
    pub mode: GovernorMode,
    pub band: Option<CoherenceBand>,
    pub last_measurement: Option<f64>,
    pub controller: AdaptiveStatus,
    pub performance: PerformanceMetrics,
    pub active_events: Vec<CircuitBreakerEvent>,
    pub total_activations: u64,
}

/// Caller-owned context: one adaptive controller plus a shareable breaker.
pub struct CoherenceGovernor {
    config: HomeostatConfig,
    controller: AdaptiveController,
    breaker: Arc<CircuitBreaker>,
    last_measurement: Option<f64>,
    band: Option<CoherenceBand>,
}

impl CoherenceGovernor {
    pub fn new(config: HomeostatConfig) -> HomeostatResult<Self> {
        config.validate()?;
        let breaker = Arc::new(CircuitBreaker::new(&config)?);
        Self::with_breaker(config, breaker)
    }

    /// Use an existing (possibly shared, sink-equipped) breaker.
    pub fn with_breaker(
        config: HomeostatConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> HomeostatResult<Self> {
        config.validate()?;
        Ok(Self {
            controller: AdaptiveController::new(&config)?,
            config,
            breaker,
            last_measurement: None,
            band: None,
        })
    }

    /// One control tick. Out-of-range measurements are rejected before any
    /// component sees them.
    ///
    /// A panic-band tick opens at most one event: while an event is open,
    /// further panic ticks escalate it rather than opening another, so
    /// `total_activations` counts distinct trips, not panic ticks.
    pub fn tick(
        &mut self,
        measurement: f64,
        event_size: Option<f64>,
        dt: Option<f64>,
    ) -> HomeostatResult<TickOutcome> {
        let measurement = require_unit("measurement", measurement)?;
        let guidance = self.controller.update(measurement, event_size, dt)?;
        self.last_measurement = Some(measurement);

        let band = self.breaker.assess(measurement);
        self.band = Some(band);
        log::debug!(
            "governor tick: coherence {measurement:.4} band {band:?} guidance {:.4}",
            guidance.guidance
        );

        let mut outcome = TickOutcome {
            guidance,
            band,
            triggered: None,
            escalated: None,
        };
        if !self.breaker.should_trigger(measurement) {
            return Ok(outcome);
        }

        if let Some(open) = self.breaker.latest_active_event() {
            match self.breaker.escalate(&open.id) {
                Ok(level) => {
                    log::debug!("governor: panic tick escalated event {} to level {level}", open.id);
                    outcome.escalated = self.breaker.get_event(&open.id);
                    return Ok(outcome);
                }
                // Resolved by another holder of the breaker since the lookup.
                Err(HomeostatError::InvalidTransition(_)) => {
                    log::warn!("event {} resolved concurrently, opening new event", open.id);
                }
                Err(e) => return Err(e),
            }
        }

        let mut metadata = Map::new();
        metadata.insert("guidance".to_string(), Value::from(outcome.guidance.guidance));
        metadata.insert("tau".to_string(), Value::from(self.controller.tau()));
        outcome.triggered = Some(self.breaker.trigger(measurement, Some(metadata))?);
        Ok(outcome)
    }

    /// Run the recovery protocol with the configured phase policy. The
    /// validation phase only passes once the last measurement is back at
    /// or above the panic threshold.
    pub fn recover<E: ActionExecutor>(
        &self,
        id: &EventId,
        executor: E,
    ) -> HomeostatResult<RecoveryReport> {
        let last = self.last_measurement.unwrap_or(f64::NAN);
        let gate = ValidationGate::new(executor, move || last, self.breaker.panic_threshold());
        RecoveryProtocol::new(&self.breaker, self.config.phase_policy).run_full_recovery(id, &gate)
    }

    /// Resolve with the most recent measurement.
    pub fn resolve(&self, id: &EventId) -> HomeostatResult<CircuitBreakerEvent> {
        let last = self.last_measurement.ok_or_else(|| {
            HomeostatError::InvalidTransition(format!(
                "cannot resolve event {id}: no measurement recorded"
            ))
        })?;
        self.breaker.resolve(id, last)
    }

    pub fn is_operation_frozen(&self, operation: &str) -> bool {
        self.breaker.is_operation_frozen(operation)
    }

    pub fn mode(&self) -> GovernorMode {
        if self.breaker.latest_active_event().is_some() {
            GovernorMode::PanicMode
        } else {
            GovernorMode::Operational
        }
    }

    pub fn status(&self) -> GovernorStatus {
        let active_events = self.breaker.active_events();
        GovernorStatus {
            mode: if active_events.is_empty() {
                GovernorMode::Operational
            } else {
                GovernorMode::PanicMode
            },
            band: self.band,
            last_measurement: self.last_measurement,
            controller: self.controller.status(),
            performance: self.controller.pid().performance_metrics(),
            active_events,
            total_activations: self.breaker.total_activations(),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn controller(&self) -> &AdaptiveController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AdaptiveController {
        &mut self.controller
    }

    pub fn config(&self) -> &HomeostatConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeostat_breaker::{
        AuditRecord, EventStatus, MemoryAuditSink, PhaseOutcome, RecoveryPhase,
    };
    use homeostat_types::PhasePolicy;

    fn make_governor() -> CoherenceGovernor {
        CoherenceGovernor::new(HomeostatConfig::default()).unwrap()
    }

    fn always_ok(_: RecoveryPhase, _: &CircuitBreakerEvent) -> PhaseOutcome {
        PhaseOutcome::success(Value::Null)
    }

    // ── Tick ──────────────────────────────────────────────────────

    #[test]
    fn test_nominal_tick() {
        let mut g = make_governor();
        let out = g.tick(0.72, None, None).unwrap();
        assert_eq!(out.band, CoherenceBand::Nominal);
        assert!(out.triggered.is_none());
        assert!((0.1..=2.0).contains(&out.guidance.guidance));
        assert_eq!(g.mode(), GovernorMode::Operational);
    }

    #[test]
    fn test_panic_tick_opens_event() {
        let mut g = make_governor();
        let out = g.tick(0.25, None, None).unwrap();
        assert_eq!(out.band, CoherenceBand::Panic);
        let ev = out.triggered.expect("panic tick opens an event");
        assert_eq!(ev.status, EventStatus::Active);
        assert_eq!(ev.escalation_level, 1);
        let expected: std::collections::BTreeSet<String> =
            g.config().frozen_operations.iter().cloned().collect();
        assert_eq!(ev.frozen_operations, expected);
        assert_eq!(g.mode(), GovernorMode::PanicMode);
        assert!(g.is_operation_frozen("coin_mint"));
    }

    #[test]
    fn test_trigger_carries_guidance_metadata() {
        let mut g = make_governor();
        let out = g.tick(0.2, None, Some(1.0)).unwrap();
        let ev = out.triggered.unwrap();
        assert_eq!(ev.metadata["guidance"], out.guidance.guidance);
        assert_eq!(ev.metadata["tau"], 0.0);
        let stored = g.breaker().get_event(&ev.id).unwrap();
        assert_eq!(stored.metadata, ev.metadata);
    }

    #[test]
    fn test_escalation_after_concurrent_resolve_opens_new_event() {
        let config = HomeostatConfig::default();
        let breaker = Arc::new(CircuitBreaker::new(&config).unwrap());
        let mut g = CoherenceGovernor::with_breaker(config, breaker.clone()).unwrap();
        let first = g.tick(0.2, None, None).unwrap().triggered.unwrap();
        // Another holder of the shared breaker closes the event.
        breaker.resolve(&first.id, 0.9).unwrap();
        let out = g.tick(0.1, None, None).unwrap();
        let second = out.triggered.unwrap();
        assert!(out.escalated.is_none());
        assert_ne!(second.id, first.id);
        assert_eq!(breaker.total_activations(), 2);
    }

    #[test]
    fn test_threshold_tick_does_not_trigger() {
        let mut g = make_governor();
        let out = g.tick(0.3, None, None).unwrap();
        assert_eq!(out.band, CoherenceBand::Review);
        assert!(out.triggered.is_none());
        assert_eq!(g.breaker().total_activations(), 0);
    }

    #[test]
    fn test_repeated_panic_escalates() {
        let mut g = make_governor();
        let first = g.tick(0.2, None, None).unwrap().triggered.unwrap();
        for expected in 2..=7u8 {
            let out = g.tick(0.1, None, None).unwrap();
            assert!(out.triggered.is_none());
            assert_eq!(out.escalated.unwrap().escalation_level, expected);
        }
        let out = g.tick(0.1, None, None).unwrap();
        assert_eq!(out.escalated.unwrap().escalation_level, 7);
        assert_eq!(g.breaker().total_activations(), 1);
        assert_eq!(g.status().active_events[0].id, first.id);
    }

    #[test]
    fn test_invalid_measurement_rejected() {
        let mut g = make_governor();
        assert!(matches!(
            g.tick(f64::NAN, None, None),
            Err(HomeostatError::InvalidParameter(_))
        ));
        assert!(g.tick(1.2, None, None).is_err());
        assert!(g.tick(-0.1, None, None).is_err());
        assert_eq!(g.status().last_measurement, None);
        assert_eq!(g.status().performance.samples, 0);
    }

    // ── Recovery / resolve ────────────────────────────────────────

    #[test]
    fn test_recover_blocked_until_coherence_returns() {
        let mut g = make_governor();
        let ev = g.tick(0.2, None, None).unwrap().triggered.unwrap();

        let report = g.recover(&ev.id, always_ok).unwrap();
        assert_eq!(report.halted_at, Some(RecoveryPhase::Validation));
        assert!(g.is_operation_frozen("coin_burn"));

        g.tick(0.55, None, None).unwrap();
        let report = g.recover(&ev.id, always_ok).unwrap();
        assert!(report.resolved);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(g.mode(), GovernorMode::Operational);
        assert!(!g.is_operation_frozen("coin_burn"));
    }

    #[test]
    fn test_recover_best_effort_policy() {
        let config = HomeostatConfig {
            phase_policy: PhasePolicy::BestEffort,
            ..Default::default()
        };
        let mut g = CoherenceGovernor::new(config).unwrap();
        let ev = g.tick(0.2, None, None).unwrap().triggered.unwrap();
        let report = g.recover(&ev.id, always_ok).unwrap();
        assert_eq!(report.attempts.len(), 7);
        assert_eq!(report.halted_at, Some(RecoveryPhase::Validation));
        assert!(!report.resolved);
    }

    #[test]
    fn test_resolve_uses_last_measurement() {
        let mut g = make_governor();
        let ev = g.tick(0.2, None, None).unwrap().triggered.unwrap();
        assert!(matches!(
            g.resolve(&ev.id),
            Err(HomeostatError::InvalidTransition(_))
        ));
        g.tick(0.65, None, None).unwrap();
        let resolved = g.resolve(&ev.id).unwrap();
        assert_eq!(resolved.status, EventStatus::Resolved);
        assert_eq!(resolved.metadata["final_measurement"], 0.65);
        assert_eq!(g.status().mode, GovernorMode::Operational);
    }

    #[test]
    fn test_panic_after_resolution_opens_new_event() {
        let mut g = make_governor();
        let first = g.tick(0.2, None, None).unwrap().triggered.unwrap();
        g.tick(0.5, None, None).unwrap();
        g.resolve(&first.id).unwrap();
        let second = g.tick(0.1, None, None).unwrap().triggered.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(g.breaker().total_activations(), 2);
    }

    // ── Scenarios ─────────────────────────────────────────────────

    #[test]
    fn test_closed_loop_converges() {
        let config = HomeostatConfig {
            soc_enabled: false,
            ..Default::default()
        };
        let mut g = CoherenceGovernor::new(config).unwrap();
        let mut current: f64 = 0.3;
        for k in 0..50 {
            let guidance = g.tick(current, None, Some(1.0)).unwrap().guidance.guidance;
            current += 0.1 * (0.7 - current) * guidance + 0.005 * (k as f64).sin();
            current = current.clamp(0.0, 1.0);
        }
        assert!((0.7 - current).abs() < 0.1, "final coherence {current}");
        assert_eq!(g.status().mode, GovernorMode::Operational);
    }

    #[test]
    fn test_audit_trail_through_shared_breaker() {
        let sink = Arc::new(MemoryAuditSink::new());
        let config = HomeostatConfig::default();
        let breaker = Arc::new(CircuitBreaker::new(&config).unwrap().with_sink(sink.clone()));
        let mut g = CoherenceGovernor::with_breaker(config, breaker.clone()).unwrap();

        let ev = g.tick(0.1, None, None).unwrap().triggered.unwrap();
        g.tick(0.1, None, None).unwrap();
        g.tick(0.8, None, None).unwrap();
        g.recover(&ev.id, always_ok).unwrap();

        let records = sink.records();
        assert!(matches!(records.first(), Some(AuditRecord::Triggered { .. })));
        assert!(matches!(records.last(), Some(AuditRecord::Resolved { .. })));
        // trigger + escalate + 7 phases + resolved
        assert_eq!(records.len(), 10);
        assert!(breaker.active_events().is_empty());
    }

    #[test]
    fn test_status_serializes() {
        let mut g = make_governor();
        g.tick(0.2, Some(3.0), None).unwrap();
        let json = serde_json::to_value(g.status()).unwrap();
        assert_eq!(json["mode"], "PANIC_MODE");
        assert_eq!(json["band"], "panic");
        assert_eq!(json["total_activations"], 1);
    }
}
