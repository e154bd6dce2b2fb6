// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Homeostat PID Core
// ─────────────────────────────────────────────────────────────────────
//! Proportional-integral-derivative controller driving guidance from
//! coherence error.
//!
//!   e(t) = target - measurement
//!   u(t) = Kp*e(t) + Ki*∫e(τ)dτ + Kd*de(t)/dt
//!
//! The integral is clamped to ±`integral_windup_limit` (anti-windup) and
//! the output to [`min_guidance`, `max_guidance`]. `dt` always comes from
//! the caller; the core never reads a clock.

use serde::{Deserialize, Serialize};

use homeostat_types::{
    clamp_bounded, require_finite, require_unit, HomeostatConfig, HomeostatError,
    HomeostatResult, RingBuffer,
};

/// Settling band as a fraction of the target.
const SETTLING_FRACTION: f64 = 0.05;

/// PID tuning gains. All gains are finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerParameters {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl ControllerParameters {
    pub fn new(kp: f64, ki: f64, kd: f64) -> HomeostatResult<Self> {
        for (name, gain) in [("kp", kp), ("ki", ki), ("kd", kd)] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(HomeostatError::InvalidParameter(format!(
                    "{name} must be finite and >= 0, got {gain}"
                )));
            }
        }
        Ok(Self { kp, ki, kd })
    }
}

/// Mutable controller state plus bounded histories.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub target: f64,
    pub measurement: f64,
    pub error: f64,
    pub integral: f64,
    pub derivative: f64,
    pub guidance: f64,
    pub previous_error: f64,
    /// Sum of caller-supplied `dt` (seconds) across ticks.
    pub elapsed_s: f64,
    pub error_history: RingBuffer<f64>,
    pub measurement_history: RingBuffer<f64>,
    pub guidance_history: RingBuffer<f64>,
    pub timestamp_history: RingBuffer<f64>,
}

/// Serialisable controller snapshot for persistence/audit collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidSnapshot {
    pub target: f64,
    pub measurement: f64,
    pub error: f64,
    pub integral: f64,
    pub derivative: f64,
    pub guidance: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub elapsed_s: f64,
    pub samples: usize,
}

/// Tracking-quality summary computed from the error/measurement history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean absolute error.
    pub mean_error: f64,
    pub rmse: f64,
    /// Maximum absolute error.
    pub max_error: f64,
    /// First tick with |error| < 5% of target (history length if never).
    pub settling_time: usize,
    /// max(measurement - target) / target, 0 when target is 0.
    pub overshoot: f64,
    pub samples: usize,
}

/// Classic PID core with anti-windup and a bounded output.
pub struct PidCore {
    params: ControllerParameters,
    state: ControllerState,
    min_guidance: f64,
    max_guidance: f64,
    windup_limit: f64,
}

impl PidCore {
    pub fn new(config: &HomeostatConfig) -> HomeostatResult<Self> {
        let params = ControllerParameters::new(config.kp, config.ki, config.kd)?;
        let target = require_unit("target", config.target)?;
        if !(config.min_guidance.is_finite()
            && config.max_guidance.is_finite()
            && config.min_guidance <= config.max_guidance)
        {
            return Err(HomeostatError::InvalidParameter(format!(
                "guidance bounds must satisfy min <= max, got [{}, {}]",
                config.min_guidance, config.max_guidance
            )));
        }
        if !(config.integral_windup_limit.is_finite() && config.integral_windup_limit > 0.0) {
            return Err(HomeostatError::InvalidParameter(format!(
                "integral_windup_limit must be > 0, got {}",
                config.integral_windup_limit
            )));
        }
        let cap = config.history_capacity;
        Ok(Self {
            params,
            state: ControllerState {
                target,
                measurement: target,
                error: 0.0,
                integral: 0.0,
                derivative: 0.0,
                guidance: 0.0,
                previous_error: 0.0,
                elapsed_s: 0.0,
                error_history: RingBuffer::new(cap)?,
                measurement_history: RingBuffer::new(cap)?,
                guidance_history: RingBuffer::new(cap)?,
                timestamp_history: RingBuffer::new(cap)?,
            },
            min_guidance: config.min_guidance,
            max_guidance: config.max_guidance,
            windup_limit: config.integral_windup_limit,
        })
    }

    /// Feed one coherence measurement and return the clamped guidance.
    ///
    /// `dt = None` means 1.0. For `dt <= 0` the derivative is forced to 0.
    /// Non-finite `measurement` or `dt` is rejected and leaves state untouched.
    pub fn update(&mut self, measurement: f64, dt: Option<f64>) -> HomeostatResult<f64> {
        let measurement = require_finite("measurement", measurement)?;
        let dt = require_finite("dt", dt.unwrap_or(1.0))?;

        let p = self.params;
        let s = &mut self.state;

        s.measurement = measurement;
        s.error = s.target - measurement;

        s.integral = (s.integral + s.error * dt).clamp(-self.windup_limit, self.windup_limit);

        s.derivative = if dt > 0.0 {
            (s.error - s.previous_error) / dt
        } else {
            0.0
        };

        let raw = p.kp * s.error + p.ki * s.integral + p.kd * s.derivative;
        s.guidance = clamp_bounded(raw, self.min_guidance, self.max_guidance);

        s.elapsed_s += dt.max(0.0);
        s.error_history.push(s.error);
        s.measurement_history.push(measurement);
        s.guidance_history.push(s.guidance);
        s.timestamp_history.push(s.elapsed_s);

        s.previous_error = s.error;
        Ok(s.guidance)
    }

    /// Zero error/integral/derivative/guidance and clear history.
    pub fn reset(&mut self) {
        let s = &mut self.state;
        s.error = 0.0;
        s.integral = 0.0;
        s.derivative = 0.0;
        s.guidance = 0.0;
        s.previous_error = 0.0;
        s.elapsed_s = 0.0;
        s.error_history.clear();
        s.measurement_history.clear();
        s.guidance_history.clear();
        s.timestamp_history.clear();
    }

    /// Replace the gains. Any negative gain is rejected, gains unchanged.
    pub fn tune(&mut self, kp: f64, ki: f64, kd: f64) -> HomeostatResult<()> {
        self.params = ControllerParameters::new(kp, ki, kd)?;
        Ok(())
    }

    pub fn set_target(&mut self, target: f64) -> HomeostatResult<()> {
        self.state.target = require_unit("target", target)?;
        Ok(())
    }

    pub fn parameters(&self) -> ControllerParameters {
        self.params
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn target(&self) -> f64 {
        self.state.target
    }

    pub fn guidance_bounds(&self) -> (f64, f64) {
        (self.min_guidance, self.max_guidance)
    }

    pub fn error_history(&self) -> &RingBuffer<f64> {
        &self.state.error_history
    }

    pub fn snapshot(&self) -> PidSnapshot {
        let s = &self.state;
        PidSnapshot {
            target: s.target,
            measurement: s.measurement,
            error: s.error,
            integral: s.integral,
            derivative: s.derivative,
            guidance: s.guidance,
            kp: self.params.kp,
            ki: self.params.ki,
            kd: self.params.kd,
            elapsed_s: s.elapsed_s,
            samples: s.error_history.len(),
        }
    }

    /// Mean/RMS/max error, settling time and overshoot over the history.
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let errors = &self.state.error_history;
        let n = errors.len();
        if n == 0 {
            return PerformanceMetrics::default();
        }
        let nf = n as f64;
        let target = self.state.target;

        let mean_error = errors.iter().map(|e| e.abs()).sum::<f64>() / nf;
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / nf).sqrt();
        let max_error = errors.iter().map(|e| e.abs()).fold(0.0, f64::max);

        let band = SETTLING_FRACTION * target;
        let settling_time = errors.iter().position(|e| e.abs() < band).unwrap_or(n);

        let overshoot = if target > 0.0 {
            let peak = self
                .state
                .measurement_history
                .iter()
                .map(|m| m - target)
                .fold(f64::NEG_INFINITY, f64::max);
            peak / target
        } else {
            0.0
        };

        PerformanceMetrics {
            mean_error,
            rmse,
            max_error,
            settling_time,
            overshoot,
            samples: n,
        }
    }

    /// Ziegler–Nichols closed-loop tuning from ultimate gain/period.
    ///
    /// Kp = 0.6*Ku, Ki = 2*Kp/Tu, Kd = Kp*Tu/8.
    pub fn auto_tune_ziegler_nichols(
        &mut self,
        ultimate_gain: f64,
        ultimate_period: f64,
    ) -> HomeostatResult<ControllerParameters> {
        if !(ultimate_period.is_finite() && ultimate_period > 0.0) {
            return Err(HomeostatError::InvalidParameter(format!(
                "ultimate_period must be > 0, got {ultimate_period}"
            )));
        }
        let kp = 0.6 * ultimate_gain;
        let ki = 2.0 * kp / ultimate_period;
        let kd = kp * ultimate_period / 8.0;
        self.tune(kp, ki, kd)?;
        Ok(self.params)
    }
}
