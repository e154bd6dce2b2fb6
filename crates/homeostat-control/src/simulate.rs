// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Closed-Loop Plant Simulation
// ─────────────────────────────────────────────────────────────────────
//! First-order plant for exercising a PID core offline:
//!
//!   current += 0.1 * (target - current) * guidance + noise(step)
//!
//! with `current` clamped to [0, 1] and `dt = 1`.

use serde::{Deserialize, Serialize};

use homeostat_types::{require_unit, HomeostatConfig, HomeostatResult};

use crate::pid::{PidCore, PidSnapshot};

/// Plant response rate per tick.
pub const PLANT_RESPONSE_RATE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTrace {
    /// Measurement fed to the controller at each step.
    pub measurements: Vec<f64>,
    pub guidance: Vec<f64>,
    pub errors: Vec<f64>,
    /// Plant value after the last step.
    pub final_measurement: f64,
    pub final_state: PidSnapshot,
}

/// Drive a fresh PID core for `steps` ticks starting at `initial`.
pub fn simulate_response<F>(
    config: &HomeostatConfig,
    initial: f64,
    steps: usize,
    mut noise: F,
) -> HomeostatResult<SimulationTrace>
where
    F: FnMut(usize) -> f64,
{
    let mut current = require_unit("initial", initial)?;
    let mut pid = PidCore::new(config)?;
    let target = pid.target();

    let mut measurements = Vec::with_capacity(steps);
    let mut guidance = Vec::with_capacity(steps);
    let mut errors = Vec::with_capacity(steps);

    for step in 0..steps {
        let g = pid.update(current, Some(1.0))?;
        measurements.push(current);
        guidance.push(g);
        errors.push(pid.state().error);

        let disturbance = noise(step);
        let next = current + PLANT_RESPONSE_RATE * (target - current) * g + disturbance;
        current = if next.is_finite() {
            next.clamp(0.0, 1.0)
        } else {
            current
        };
    }

    log::debug!(
        "simulation: {steps} steps from {initial:.3}, final {current:.4} (target {target:.3})"
    );

    Ok(SimulationTrace {
        measurements,
        guidance,
        errors,
        final_measurement: current,
        final_state: pid.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_converges() {
        let config = HomeostatConfig::default();
        let trace = simulate_response(&config, 0.3, 50, |k| 0.005 * (k as f64).sin()).unwrap();
        assert_eq!(trace.measurements.len(), 50);
        assert_eq!(trace.measurements[0], 0.3);
        let final_error = (0.7 - trace.final_measurement).abs();
        assert!(final_error < 0.1, "final error {final_error}");
        assert!(trace.final_state.error.abs() < 0.1);
    }

    #[test]
    fn test_guidance_within_bounds() {
        let config = HomeostatConfig::default();
        let trace = simulate_response(&config, 0.0, 200, |k| 0.05 * ((k * 7) as f64).cos()).unwrap();
        assert!(trace.guidance.iter().all(|g| (0.1..=2.0).contains(g)));
        assert!(trace.measurements.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn test_non_finite_noise_ignored() {
        let config = HomeostatConfig::default();
        let trace = simulate_response(&config, 0.5, 10, |_| f64::NAN).unwrap();
        assert!(trace.final_measurement.is_finite());
        assert!(trace.measurements.iter().all(|m| *m == 0.5));
    }

    #[test]
    fn test_invalid_initial_rejected() {
        let config = HomeostatConfig::default();
        assert!(simulate_response(&config, 1.5, 10, |_| 0.0).is_err());
    }

    #[test]
    fn test_zero_steps() {
        let trace = simulate_response(&HomeostatConfig::default(), 0.4, 0, |_| 0.0).unwrap();
        assert!(trace.measurements.is_empty());
        assert_eq!(trace.final_measurement, 0.4);
        assert_eq!(trace.final_state.samples, 0);
    }
}
