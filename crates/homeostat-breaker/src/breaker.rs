// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Constitutional Circuit Breaker
// ─────────────────────────────────────────────────────────────────────
//! STANDBY → ACTIVE → RECOVERING → RESOLVED.
//!
//! The breaker trips when coherence falls strictly below the panic
//! threshold. Each trip opens an event that freezes the configured
//! operation catalog until the event resolves, either by completing all
//! seven recovery phases or by an explicit `resolve` at or above the
//! threshold.
//!
//! All events live in one registry behind a `RwLock`: mutations are
//! serialised on the write lock, queries clone a snapshot under the read
//! lock. Audit records go out after the lock is dropped.
//!
//! Open events are also indexed in trigger order, so the per-tick queries
//! cost O(open events). Resolved events stay queryable by id until
//! [`CircuitBreaker::prune_resolved`] drops them.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use homeostat_types::{require_finite, require_unit, HomeostatConfig, HomeostatError, HomeostatResult};

use crate::audit::{emit, AuditRecord, AuditSink};
use crate::event::{
    CircuitBreakerEvent, CoherenceBand, EventId, EventStatus, PhaseAdvance, RecoveryAction,
    MAX_ESCALATION,
};

#[derive(Default)]
struct Registry {
    events: HashMap<EventId, CircuitBreakerEvent>,
    // Open events only, oldest trigger first.
    open: Vec<EventId>,
}

impl Registry {
    fn open_events(&self) -> impl DoubleEndedIterator<Item = &CircuitBreakerEvent> {
        self.open.iter().filter_map(|id| self.events.get(id))
    }
}

pub struct CircuitBreaker {
    panic_threshold: f64,
    review_threshold: f64,
    default_frozen: BTreeSet<String>,
    registry: RwLock<Registry>,
    activations: AtomicU64,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl CircuitBreaker {
    pub fn new(config: &HomeostatConfig) -> HomeostatResult<Self> {
        let panic_threshold = require_unit("panic_threshold", config.panic_threshold)?;
        let review_threshold = require_unit("review_threshold", config.review_threshold)?;
        if review_threshold < panic_threshold {
            return Err(HomeostatError::InvalidParameter(format!(
                "review_threshold ({review_threshold}) below panic_threshold ({panic_threshold})"
            )));
        }
        Ok(Self {
            panic_threshold,
            review_threshold,
            default_frozen: config.frozen_operations.iter().cloned().collect(),
            registry: RwLock::new(Registry::default()),
            activations: AtomicU64::new(0),
            sinks: Vec::new(),
        })
    }

    /// Attach an audit sink.
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn panic_threshold(&self) -> f64 {
        self.panic_threshold
    }

    /// `measurement < panic_threshold`. NaN never trips.
    pub fn should_trigger(&self, measurement: f64) -> bool {
        measurement < self.panic_threshold
    }

    pub fn assess(&self, measurement: f64) -> CoherenceBand {
        if self.should_trigger(measurement) {
            CoherenceBand::Panic
        } else if measurement < self.review_threshold {
            CoherenceBand::Review
        } else {
            CoherenceBand::Nominal
        }
    }

    /// Open a new event at escalation 1, phase 1, freezing the default
    /// operation set.
    pub fn trigger(
        &self,
        measurement: f64,
        metadata: Option<Map<String, Value>>,
    ) -> HomeostatResult<CircuitBreakerEvent> {
        let measurement = require_finite("measurement", measurement)?;
        let event = CircuitBreakerEvent::open(
            measurement,
            self.panic_threshold,
            self.default_frozen.clone(),
            metadata.unwrap_or_default(),
        );
        {
            let mut reg = self.registry.write();
            reg.open.push(event.id);
            reg.events.insert(event.id, event.clone());
        }
        self.activations.fetch_add(1, Ordering::Relaxed);

        log::error!(
            ">>> CIRCUIT BREAKER TRIPPED: coherence {measurement:.4} < {:.4}, event {} <<<",
            self.panic_threshold,
            event.id
        );
        emit(
            &self.sinks,
            &AuditRecord::Triggered {
                event: event.clone(),
            },
        );
        Ok(event)
    }

    /// Raise the escalation level by one, capped at 7. Returns the level.
    pub fn escalate(&self, id: &EventId) -> HomeostatResult<u8> {
        let (level, raised) = self.mutate(id, |ev| {
            if ev.escalation_level < MAX_ESCALATION {
                ev.escalation_level += 1;
                Ok((ev.escalation_level, true))
            } else {
                Ok((ev.escalation_level, false))
            }
        })?;
        if raised {
            log::warn!("breaker event {id} escalated to level {level}");
            emit(&self.sinks, &AuditRecord::Escalated { event_id: *id, level });
        }
        Ok(level)
    }

    /// Record one phase action against the event's current phase.
    ///
    /// Success moves to the next phase (status RECOVERING), or resolves the
    /// event after resumption. Failure is recorded but leaves phase and
    /// status untouched.
    pub fn advance_recovery_phase(
        &self,
        id: &EventId,
        action: RecoveryAction,
    ) -> HomeostatResult<PhaseAdvance> {
        let (advance, resolved_at) = self.mutate(id, |ev| {
            let current = ev.recovery_phase.ok_or_else(|| {
                HomeostatError::InvalidTransition(format!("event {} has no open phase", ev.id))
            })?;
            if action.phase != current {
                return Err(HomeostatError::InvalidTransition(format!(
                    "event {} is at phase {current}, got action for phase {}",
                    ev.id, action.phase
                )));
            }
            ev.recovery_history.push(action.clone());

            if !action.success {
                return Ok((PhaseAdvance::Held(current), None));
            }
            match current.next() {
                Some(next) => {
                    ev.recovery_phase = Some(next);
                    ev.status = EventStatus::Recovering;
                    Ok((PhaseAdvance::Advanced(next), None))
                }
                None => {
                    let now = Utc::now();
                    ev.recovery_phase = None;
                    ev.status = EventStatus::Resolved;
                    ev.resolved_at = Some(now);
                    Ok((PhaseAdvance::Resolved, Some(now)))
                }
            }
        })?;

        match advance {
            PhaseAdvance::Advanced(next) => {
                log::info!("breaker event {id}: phase {} ok, now at {next}", action.phase)
            }
            PhaseAdvance::Resolved => log::info!("breaker event {id}: recovery complete"),
            PhaseAdvance::Held(phase) => log::warn!("breaker event {id}: phase {phase} failed, held"),
        }
        emit(
            &self.sinks,
            &AuditRecord::PhaseRecorded {
                event_id: *id,
                action,
                advance,
            },
        );
        if let Some(resolved_at) = resolved_at {
            emit(
                &self.sinks,
                &AuditRecord::Resolved {
                    event_id: *id,
                    resolved_at,
                    final_measurement: None,
                },
            );
        }
        Ok(advance)
    }

    /// Close the event with a measurement at or above the panic threshold.
    pub fn resolve(
        &self,
        id: &EventId,
        final_measurement: f64,
    ) -> HomeostatResult<CircuitBreakerEvent> {
        let final_measurement = require_finite("final_measurement", final_measurement)?;
        let threshold = self.panic_threshold;
        let event = self.mutate(id, |ev| {
            if final_measurement < threshold {
                return Err(HomeostatError::InvalidTransition(format!(
                    "cannot resolve event {}: coherence {final_measurement:.4} still below {threshold:.4}",
                    ev.id
                )));
            }
            ev.status = EventStatus::Resolved;
            ev.recovery_phase = None;
            ev.resolved_at = Some(Utc::now());
            ev.metadata
                .insert("final_measurement".to_string(), Value::from(final_measurement));
            Ok(ev.clone())
        })?;

        log::info!("breaker event {id} resolved at coherence {final_measurement:.4}");
        if let Some(resolved_at) = event.resolved_at {
            emit(
                &self.sinks,
                &AuditRecord::Resolved {
                    event_id: *id,
                    resolved_at,
                    final_measurement: Some(final_measurement),
                },
            );
        }
        Ok(event)
    }

    /// Replace the frozen set of an open event.
    pub fn freeze_operations<I, S>(&self, id: &EventId, operations: I) -> HomeostatResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let operations: BTreeSet<String> = operations.into_iter().map(Into::into).collect();
        self.mutate(id, |ev| {
            ev.frozen_operations = operations.clone();
            Ok(())
        })?;
        emit(
            &self.sinks,
            &AuditRecord::FrozenSetChanged {
                event_id: *id,
                operations,
            },
        );
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────

    pub fn get_event(&self, id: &EventId) -> Option<CircuitBreakerEvent> {
        self.registry.read().events.get(id).cloned()
    }

    pub fn recovery_history(&self, id: &EventId) -> HomeostatResult<Vec<RecoveryAction>> {
        self.registry
            .read()
            .events
            .get(id)
            .map(|ev| ev.recovery_history.clone())
            .ok_or_else(|| unknown(id))
    }

    /// Active or recovering events, oldest trigger first.
    pub fn active_events(&self) -> Vec<CircuitBreakerEvent> {
        self.registry.read().open_events().cloned().collect()
    }

    /// Most recently triggered open event.
    pub fn latest_active_event(&self) -> Option<CircuitBreakerEvent> {
        self.registry.read().open_events().next_back().cloned()
    }

    /// Union of frozen sets across open events.
    pub fn frozen_operations(&self) -> BTreeSet<String> {
        self.registry
            .read()
            .open_events()
            .flat_map(|ev| ev.frozen_operations.iter().cloned())
            .collect()
    }

    pub fn is_operation_frozen(&self, operation: &str) -> bool {
        self.registry
            .read()
            .open_events()
            .any(|ev| ev.frozen_operations.contains(operation))
    }

    /// Drop resolved events whose resolution is older than `older_than`.
    /// Open events are never pruned. Returns the number removed.
    pub fn prune_resolved(&self, older_than: DateTime<Utc>) -> usize {
        let mut reg = self.registry.write();
        let before = reg.events.len();
        reg.events
            .retain(|_, ev| ev.is_open() || ev.resolved_at.map_or(true, |at| at >= older_than));
        let removed = before - reg.events.len();
        if removed > 0 {
            log::debug!("breaker: pruned {removed} resolved events");
        }
        removed
    }

    pub fn total_activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Run `f` on an open event under the write lock. Unknown ids and
    /// resolved events are rejected before `f` sees them.
    fn mutate<R>(
        &self,
        id: &EventId,
        f: impl FnOnce(&mut CircuitBreakerEvent) -> HomeostatResult<R>,
    ) -> HomeostatResult<R> {
        let mut guard = self.registry.write();
        let reg = &mut *guard;
        let ev = reg.events.get_mut(id).ok_or_else(|| unknown(id))?;
        if !ev.is_open() {
            return Err(HomeostatError::InvalidTransition(format!(
                "event {id} is resolved"
            )));
        }
        let out = f(ev);
        if !ev.is_open() {
            reg.open.retain(|open| open != id);
        }
        out
    }
}

fn unknown(id: &EventId) -> HomeostatError {
    HomeostatError::UnknownEvent(id.to_string())
}
