// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Homeostat Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{HomeostatError, HomeostatResult};

/// How a full recovery run reacts to a failed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhasePolicy {
    /// Stop at the first failed phase; the caller retries later.
    #[default]
    HaltOnFailure,
    /// Keep invoking the remaining phase handlers for their payloads.
    /// The breaker still parks at the first failed phase.
    BestEffort,
}

/// Runtime configuration for the Homeostat kernel.
///
/// One flat struct covering the controller, the criticality estimator,
/// valley-ascent escape and the circuit breaker. Missing JSON fields fall
/// back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeostatConfig {
    /// Coherence setpoint in [0, 1]. Default: 0.7.
    pub target: f64,

    /// Proportional gain. Default: 1.0.
    pub kp: f64,

    /// Integral gain. Default: 0.5.
    pub ki: f64,

    /// Derivative gain. Default: 0.2.
    pub kd: f64,

    /// Lower guidance bound. Default: 0.1.
    pub min_guidance: f64,

    /// Upper guidance bound. Default: 2.0.
    pub max_guidance: f64,

    /// Integral accumulator clamp (symmetric). Default: 10.0.
    pub integral_windup_limit: f64,

    /// Capacity of the error/measurement/guidance/timestamp histories.
    /// Default: 10 000.
    pub history_capacity: usize,

    /// Breaker trips when coherence is strictly below this. Default: 0.3.
    pub panic_threshold: f64,

    /// Coherence below this (but above panic) is flagged for review.
    /// Default: 0.67.
    pub review_threshold: f64,

    /// Enables the criticality + valley-ascent decorator. Default: true.
    pub soc_enabled: bool,

    /// Target power-law exponent. Default: 1.5.
    pub target_tau: f64,

    /// Half-width of the critical band around `target_tau`. Default: 0.2.
    pub tau_tolerance: f64,

    /// Guidance gain applied to the tau error. Default: 0.2.
    pub soc_gain: f64,

    /// Recompute tau every N accepted event sizes. Default: 50.
    pub tau_interval: usize,

    /// Event-size window capacity. Default: 1000.
    pub sample_capacity: usize,

    /// Maximum induced coherence dip during valley descent. Default: 0.2.
    pub max_descent_depth: f64,

    /// Weight of criticality vs coherence in `fitness`. Default: 0.3.
    pub complexity_weight: f64,

    /// Operations frozen by every new breaker event.
    pub frozen_operations: Vec<String>,

    /// Recovery-run behavior on a failed phase. Default: halt.
    pub phase_policy: PhasePolicy,
}

impl Default for HomeostatConfig {
    fn default() -> Self {
        Self {
            target: 0.7,
            kp: 1.0,
            ki: 0.5,
            kd: 0.2,
            min_guidance: 0.1,
            max_guidance: 2.0,
            integral_windup_limit: 10.0,
            history_capacity: 10_000,
            panic_threshold: 0.3,
            review_threshold: 0.67,
            soc_enabled: true,
            target_tau: 1.5,
            tau_tolerance: 0.2,
            soc_gain: 0.2,
            tau_interval: 50,
            sample_capacity: 1000,
            max_descent_depth: 0.2,
            complexity_weight: 0.3,
            frozen_operations: vec![
                "coin_mint".to_string(),
                "coin_burn".to_string(),
                "vault_node_generation".to_string(),
            ],
            phase_policy: PhasePolicy::HaltOnFailure,
        }
    }
}

fn unit(name: &str, value: f64) -> HomeostatResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(HomeostatError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> HomeostatResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(HomeostatError::Config(format!(
            "{name} must be finite and >= 0, got {value}"
        )))
    }
}

impl HomeostatConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> HomeostatResult<()> {
        non_negative("kp", self.kp)?;
        non_negative("ki", self.ki)?;
        non_negative("kd", self.kd)?;
        unit("target", self.target)?;
        unit("panic_threshold", self.panic_threshold)?;
        unit("review_threshold", self.review_threshold)?;
        unit("complexity_weight", self.complexity_weight)?;
        if self.review_threshold < self.panic_threshold {
            return Err(HomeostatError::Config(format!(
                "review_threshold ({}) must be >= panic_threshold ({})",
                self.review_threshold, self.panic_threshold
            )));
        }
        non_negative("min_guidance", self.min_guidance)?;
        if !self.max_guidance.is_finite() || self.max_guidance < self.min_guidance {
            return Err(HomeostatError::Config(format!(
                "max_guidance must be finite and >= min_guidance, got [{}, {}]",
                self.min_guidance, self.max_guidance
            )));
        }
        if !(self.integral_windup_limit.is_finite() && self.integral_windup_limit > 0.0) {
            return Err(HomeostatError::Config(format!(
                "integral_windup_limit must be > 0, got {}",
                self.integral_windup_limit
            )));
        }
        if self.history_capacity < 10 {
            return Err(HomeostatError::Config(format!(
                "history_capacity must be >= 10, got {}",
                self.history_capacity
            )));
        }
        if self.sample_capacity < 1 {
            return Err(HomeostatError::Config(
                "sample_capacity must be >= 1".to_string(),
            ));
        }
        if self.tau_interval < 1 {
            return Err(HomeostatError::Config(
                "tau_interval must be >= 1".to_string(),
            ));
        }
        non_negative("target_tau", self.target_tau)?;
        non_negative("tau_tolerance", self.tau_tolerance)?;
        if !self.soc_gain.is_finite() {
            return Err(HomeostatError::Config(format!(
                "soc_gain must be finite, got {}",
                self.soc_gain
            )));
        }
        if !(self.max_descent_depth.is_finite() && self.max_descent_depth > 0.0) {
            return Err(HomeostatError::Config(format!(
                "max_descent_depth must be > 0, got {}",
                self.max_descent_depth
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> HomeostatResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| HomeostatError::Config(format!("JSON parse error: {e}")))
    }
}
