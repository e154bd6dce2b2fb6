// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Diffusion Guidance Scale
// ─────────────────────────────────────────────────────────────────────
//! Maps PID guidance onto the guidance scale of a downstream diffusion
//! sampler.
//!
//!   scale(t) = base_scale * u(t)
//!
//! The process variable is model uncertainty: normalised Shannon entropy
//! of the sampler's predictions, see [`model_uncertainty`].

use serde::{Deserialize, Serialize};

use homeostat_types::{HomeostatError, HomeostatResult};

use crate::pid::PidCore;

/// Classifier-free guidance scale the PID output multiplies.
pub const DEFAULT_BASE_SCALE: f64 = 7.5;

/// Control signal handed to the sampler after each update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSignal {
    /// Raw PID guidance.
    pub guidance: f64,
    /// `base_scale * guidance`.
    pub guidance_scale: f64,
    pub error: f64,
    pub target: f64,
    pub measurement: f64,
    pub elapsed_s: f64,
}

pub struct DiffusionGuidance {
    pid: PidCore,
    base_scale: f64,
}

impl DiffusionGuidance {
    pub fn new(pid: PidCore, base_scale: f64) -> HomeostatResult<Self> {
        if !(base_scale.is_finite() && base_scale > 0.0) {
            return Err(HomeostatError::InvalidParameter(format!(
                "base guidance scale must be > 0, got {base_scale}"
            )));
        }
        Ok(Self { pid, base_scale })
    }

    /// Feed one measurement through the PID and return the scaled guidance.
    pub fn update_guidance_scale(
        &mut self,
        measurement: f64,
        dt: Option<f64>,
    ) -> HomeostatResult<f64> {
        let guidance = self.pid.update(measurement, dt)?;
        Ok(self.base_scale * guidance)
    }

    pub fn control_signal(&self) -> ControlSignal {
        let s = self.pid.state();
        ControlSignal {
            guidance: s.guidance,
            guidance_scale: self.base_scale * s.guidance,
            error: s.error,
            target: s.target,
            measurement: s.measurement,
            elapsed_s: s.elapsed_s,
        }
    }

    pub fn base_scale(&self) -> f64 {
        self.base_scale
    }

    pub fn pid(&self) -> &PidCore {
        &self.pid
    }

    pub fn pid_mut(&mut self) -> &mut PidCore {
        &mut self.pid
    }
}

/// Shannon entropy of `|p| / Σ|p|`, normalised by `ln(n)` into [0, 1].
///
/// Non-finite predictions are skipped. Returns 0 with fewer than two
/// usable predictions or when every prediction is zero.
pub fn model_uncertainty(predictions: &[f64]) -> f64 {
    let mags: Vec<f64> = predictions
        .iter()
        .filter(|p| p.is_finite())
        .map(|p| p.abs())
        .collect();
    if mags.len() < 2 {
        return 0.0;
    }
    let total: f64 = mags.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let entropy: f64 = mags
        .iter()
        .map(|m| m / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    (entropy / (mags.len() as f64).ln()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeostat_types::HomeostatConfig;

    fn make_pid() -> PidCore {
        PidCore::new(&HomeostatConfig::default()).unwrap()
    }

    // ── model_uncertainty ─────────────────────────────────────────

    #[test]
    fn test_uncertainty_empty_and_single() {
        assert_eq!(model_uncertainty(&[]), 0.0);
        assert_eq!(model_uncertainty(&[0.8]), 0.0);
    }

    #[test]
    fn test_uncertainty_uniform_is_one() {
        let u = model_uncertainty(&[0.25; 16]);
        assert!((u - 1.0).abs() < 1e-12, "u={u}");
    }

    #[test]
    fn test_uncertainty_one_hot_is_zero() {
        assert_eq!(model_uncertainty(&[0.0, 0.0, 1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_uncertainty_uses_magnitudes() {
        let u = model_uncertainty(&[-1.0, 1.0]);
        assert!((u - 1.0).abs() < 1e-12, "u={u}");
        let skewed = model_uncertainty(&[9.0, 1.0]);
        assert!(skewed > 0.0 && skewed < 1.0, "skewed={skewed}");
    }

    #[test]
    fn test_uncertainty_degenerate_inputs() {
        assert_eq!(model_uncertainty(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(model_uncertainty(&[f64::NAN, 2.0]), 0.0);
    }

    // ── Guidance scale ────────────────────────────────────────────

    #[test]
    fn test_scaled_guidance_tracks_pid() {
        let mut reference = make_pid();
        let mut dg = DiffusionGuidance::new(make_pid(), DEFAULT_BASE_SCALE).unwrap();
        for m in [0.4, 0.55, 0.62, 0.7] {
            let expected = DEFAULT_BASE_SCALE * reference.update(m, Some(1.0)).unwrap();
            let scaled = dg.update_guidance_scale(m, Some(1.0)).unwrap();
            assert!((scaled - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_control_signal_snapshot() {
        let mut dg = DiffusionGuidance::new(make_pid(), 5.0).unwrap();
        let scaled = dg.update_guidance_scale(0.5, Some(2.0)).unwrap();
        let sig = dg.control_signal();
        assert_eq!(sig.guidance_scale, scaled);
        assert_eq!(sig.guidance_scale, 5.0 * sig.guidance);
        assert_eq!(sig.measurement, 0.5);
        assert_eq!(sig.target, dg.pid().target());
        assert!((sig.error - (sig.target - 0.5)).abs() < 1e-12);
        assert_eq!(sig.elapsed_s, 2.0);
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["guidance_scale"], scaled);
    }

    #[test]
    fn test_invalid_measurement_leaves_signal() {
        let mut dg = DiffusionGuidance::new(make_pid(), DEFAULT_BASE_SCALE).unwrap();
        dg.update_guidance_scale(0.5, None).unwrap();
        let before = dg.control_signal();
        assert!(dg.update_guidance_scale(f64::NAN, None).is_err());
        assert_eq!(dg.control_signal(), before);
    }

    #[test]
    fn test_base_scale_validated() {
        assert!(DiffusionGuidance::new(make_pid(), 0.0).is_err());
        assert!(DiffusionGuidance::new(make_pid(), f64::INFINITY).is_err());
    }
}
