// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Composite Adaptive Controller
// ─────────────────────────────────────────────────────────────────────
//! PID core plus an optional self-organised-criticality strategy.
//!
//!   guidance = pid * (1 + soc_adjustment + valley_adjustment)
//!
//! clamped to the PID guidance bounds. With the strategy disabled the
//! composite output is the plain PID guidance.

use serde::{Deserialize, Serialize};

use homeostat_types::{clamp_bounded, require_finite, HomeostatConfig, HomeostatResult};

use crate::criticality::{CriticalityEstimator, CriticalityMetrics};
use crate::pid::{PidCore, PidSnapshot};
use crate::valley::{ValleyAscentController, ValleyAscentState};

const INTENSITY_STEP: f64 = 0.1;
const INTENSITY_RANGE: (f64, f64) = (0.1, 1.0);
const FREQUENCY_STEP: f64 = 0.05;
const FREQUENCY_RANGE: (f64, f64) = (0.01, 0.5);

/// Perturbation intensity/frequency pair handed to the downstream
/// generator. Pushed up while below the target exponent, down above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParameters {
    pub intensity: f64,
    pub frequency: f64,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            intensity: 0.5,
            frequency: 0.1,
        }
    }
}

/// Criticality estimator and valley-ascent escape working as one strategy.
pub struct SocStrategy {
    estimator: CriticalityEstimator,
    valley: ValleyAscentController,
    gain: f64,
}

impl SocStrategy {
    pub fn new(config: &HomeostatConfig) -> HomeostatResult<Self> {
        Ok(Self {
            estimator: CriticalityEstimator::new(
                config.sample_capacity,
                config.target_tau,
                config.tau_tolerance,
                config.tau_interval,
            )?,
            valley: ValleyAscentController::new(config.max_descent_depth),
            gain: config.soc_gain,
        })
    }

    /// `(target_tau - tau) * gain`, 0 before the first estimate.
    pub fn soc_adjustment(&self) -> f64 {
        if !self.estimator.has_estimate() {
            return 0.0;
        }
        (self.estimator.target_tau() - self.estimator.tau()) * self.gain
    }

    pub fn estimator(&self) -> &CriticalityEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut CriticalityEstimator {
        &mut self.estimator
    }

    pub fn valley(&self) -> &ValleyAscentController {
        &self.valley
    }
}

/// Breakdown of one composite tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceReport {
    pub base_guidance: f64,
    pub soc_adjustment: f64,
    pub valley_adjustment: f64,
    pub guidance: f64,
    pub criticality: Option<CriticalityMetrics>,
    pub valley: Option<ValleyAscentState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveStatus {
    pub pid: PidSnapshot,
    pub criticality: Option<CriticalityMetrics>,
    pub valley: Option<ValleyAscentState>,
    pub tuning: TuningParameters,
    pub complexity_weight: f64,
    pub target_tau: f64,
    pub guidance: f64,
}

pub struct AdaptiveController {
    pid: PidCore,
    soc: Option<SocStrategy>,
    tuning: TuningParameters,
    target_tau: f64,
    complexity_weight: f64,
    guidance: f64,
}

impl AdaptiveController {
    pub fn new(config: &HomeostatConfig) -> HomeostatResult<Self> {
        config.validate()?;
        let soc = if config.soc_enabled {
            Some(SocStrategy::new(config)?)
        } else {
            None
        };
        Ok(Self {
            pid: PidCore::new(config)?,
            soc,
            tuning: TuningParameters::default(),
            target_tau: config.target_tau,
            complexity_weight: config.complexity_weight,
            guidance: 0.0,
        })
    }

    /// One control tick. An optional event size is recorded before the
    /// PID update. Invalid `measurement`/`dt` leave every component
    /// untouched.
    pub fn update(
        &mut self,
        measurement: f64,
        event_size: Option<f64>,
        dt: Option<f64>,
    ) -> HomeostatResult<GuidanceReport> {
        require_finite("measurement", measurement)?;
        if let Some(dt) = dt {
            require_finite("dt", dt)?;
        }

        if let (Some(size), Some(soc)) = (event_size, self.soc.as_mut()) {
            soc.estimator.record_event_size(size);
        }

        let base_guidance = self.pid.update(measurement, dt)?;

        let (soc_adjustment, valley_adjustment) = match self.soc.as_mut() {
            Some(soc) => {
                let valley = soc
                    .valley
                    .compute_adjustment(measurement, self.pid.error_history());
                (soc.soc_adjustment(), valley)
            }
            None => (0.0, 0.0),
        };

        let guidance = match self.soc {
            Some(_) => {
                let (lo, hi) = self.pid.guidance_bounds();
                clamp_bounded(
                    base_guidance * (1.0 + soc_adjustment + valley_adjustment),
                    lo,
                    hi,
                )
            }
            None => base_guidance,
        };
        self.guidance = guidance;

        Ok(GuidanceReport {
            base_guidance,
            soc_adjustment,
            valley_adjustment,
            guidance,
            criticality: self.soc.as_ref().map(|s| s.estimator.metrics()),
            valley: self.soc.as_ref().map(|s| s.valley.state().clone()),
        })
    }

    /// Record an event size without ticking the PID. Returns whether the
    /// size was accepted.
    pub fn record_event_size(&mut self, size: f64) -> bool {
        match self.soc.as_mut() {
            Some(soc) => soc.estimator.record_event_size(size),
            None => false,
        }
    }

    /// Current exponent estimate (0 without the strategy or a fit).
    pub fn tau(&self) -> f64 {
        self.soc.as_ref().map_or(0.0, |s| s.estimator.tau())
    }

    /// Step the tuning pair toward criticality and return it.
    pub fn adjust_tuning_parameters(&mut self) -> TuningParameters {
        let tau = self.tau();
        let t = &mut self.tuning;
        if tau < self.target_tau {
            t.intensity = (t.intensity + INTENSITY_STEP).min(INTENSITY_RANGE.1);
            t.frequency = (t.frequency + FREQUENCY_STEP).min(FREQUENCY_RANGE.1);
        } else if tau > self.target_tau {
            t.intensity = (t.intensity - INTENSITY_STEP).max(INTENSITY_RANGE.0);
            t.frequency = (t.frequency - FREQUENCY_STEP).max(FREQUENCY_RANGE.0);
        }
        *t
    }

    /// ((1-w)*coherence + w/(1+|tau-target_tau|)) / (1+residue).
    /// Non-finite results map to 0.
    pub fn fitness(&self, coherence: f64, tau: f64, residue: f64) -> f64 {
        let w = self.complexity_weight;
        let criticality = 1.0 / (1.0 + (tau - self.target_tau).abs());
        let value = ((1.0 - w) * coherence + w * criticality) * (1.0 / (1.0 + residue));
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }

    /// Reset the PID core and abandon any valley manoeuvre. The event-size
    /// window is kept.
    pub fn reset(&mut self) {
        self.pid.reset();
        if let Some(soc) = self.soc.as_mut() {
            soc.valley.reset();
        }
        self.guidance = 0.0;
    }

    pub fn pid(&self) -> &PidCore {
        &self.pid
    }

    pub fn pid_mut(&mut self) -> &mut PidCore {
        &mut self.pid
    }

    pub fn soc(&self) -> Option<&SocStrategy> {
        self.soc.as_ref()
    }

    pub fn soc_mut(&mut self) -> Option<&mut SocStrategy> {
        self.soc.as_mut()
    }

    pub fn tuning(&self) -> TuningParameters {
        self.tuning
    }

    pub fn guidance(&self) -> f64 {
        self.guidance
    }

    pub fn status(&self) -> AdaptiveStatus {
        AdaptiveStatus {
            pid: self.pid.snapshot(),
            criticality: self.soc.as_ref().map(|s| s.estimator.metrics()),
            valley: self.soc.as_ref().map(|s| s.valley.state().clone()),
            tuning: self.tuning,
            complexity_weight: self.complexity_weight,
            target_tau: self.target_tau,
            guidance: self.guidance,
        }
    }
}
