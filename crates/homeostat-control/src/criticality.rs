// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Criticality Estimator (power-law tau)
// ─────────────────────────────────────────────────────────────────────
//! Estimates the avalanche-size exponent tau from a bounded window of
//! event sizes.
//!
//!   P(s) ~ s^(-tau)
//!
//! Sizes are binned into 20 log-spaced bins between the window min and
//! max; tau is the negated least-squares slope of log10(count) against
//! log10(left bin edge) over the non-empty bins.

use serde::{Deserialize, Serialize};

use homeostat_types::{HomeostatError, HomeostatResult, RingBuffer};

const N_BINS: usize = 20;
const MIN_SAMPLES: usize = 10;
const MIN_NONZERO_BINS: usize = 5;

/// Point-in-time view of the estimator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalityMetrics {
    pub tau: f64,
    /// False until a fit has succeeded; `tau` is 0 while false.
    pub has_estimate: bool,
    pub sample_count: usize,
    pub is_critical: bool,
    pub distance_from_criticality: f64,
}

pub struct CriticalityEstimator {
    samples: RingBuffer<f64>,
    tau: f64,
    has_estimate: bool,
    is_critical: bool,
    distance_from_criticality: f64,
    target_tau: f64,
    tolerance: f64,
    interval: usize,
    accepted: u64,
}

impl CriticalityEstimator {
    pub fn new(
        capacity: usize,
        target_tau: f64,
        tolerance: f64,
        interval: usize,
    ) -> HomeostatResult<Self> {
        if interval == 0 {
            return Err(HomeostatError::InvalidParameter(
                "tau interval must be >= 1".to_string(),
            ));
        }
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(HomeostatError::InvalidParameter(format!(
                "tau tolerance must be >= 0, got {tolerance}"
            )));
        }
        Ok(Self {
            samples: RingBuffer::new(capacity)?,
            tau: 0.0,
            has_estimate: false,
            is_critical: false,
            distance_from_criticality: 0.0,
            target_tau,
            tolerance,
            interval,
            accepted: 0,
        })
    }

    /// Append one event size. Non-positive or non-finite sizes are
    /// ignored and `false` is returned. Every `interval` accepted sizes
    /// tau is re-estimated and the criticality flag refreshed.
    pub fn record_event_size(&mut self, size: f64) -> bool {
        if !(size.is_finite() && size > 0.0) {
            log::debug!("criticality: ignoring event size {size}");
            return false;
        }
        self.samples.push(size);
        self.accepted += 1;
        if self.accepted % self.interval as u64 == 0 {
            self.estimate_tau();
            self.update_criticality_state(self.target_tau, self.tolerance);
        }
        true
    }

    /// Fit tau over the current window. Returns 0 (and clears
    /// `has_estimate`) when the fit is not possible.
    pub fn estimate_tau(&mut self) -> f64 {
        match power_law_exponent(self.samples.iter().copied()) {
            Some(tau) => {
                self.tau = tau;
                self.has_estimate = true;
            }
            None => {
                self.tau = 0.0;
                self.has_estimate = false;
            }
        }
        self.tau
    }

    /// Refresh `distance_from_criticality` and `is_critical` against the
    /// given band.
    pub fn update_criticality_state(&mut self, target_tau: f64, tolerance: f64) {
        self.distance_from_criticality = (self.tau - target_tau).abs();
        self.is_critical = self.distance_from_criticality <= tolerance;
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn has_estimate(&self) -> bool {
        self.has_estimate
    }

    pub fn is_critical(&self) -> bool {
        self.is_critical
    }

    pub fn target_tau(&self) -> f64 {
        self.target_tau
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn metrics(&self) -> CriticalityMetrics {
        CriticalityMetrics {
            tau: self.tau,
            has_estimate: self.has_estimate,
            sample_count: self.samples.len(),
            is_critical: self.is_critical,
            distance_from_criticality: self.distance_from_criticality,
        }
    }
}

/// Power-law exponent of a sample of positive sizes, or `None` when there
/// are fewer than 10 usable sizes or fewer than 5 non-empty bins.
pub fn power_law_exponent(sizes: impl IntoIterator<Item = f64>) -> Option<f64> {
    let sizes: Vec<f64> = sizes
        .into_iter()
        .filter(|s| s.is_finite() && *s > 0.0)
        .collect();
    if sizes.len() < MIN_SAMPLES {
        return None;
    }

    let (lo, hi) = sizes
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    let log_lo = lo.log10();
    let span = hi.log10() - log_lo;
    if span <= 0.0 {
        // Every size equal: a single occupied bin.
        return None;
    }

    let mut counts = [0usize; N_BINS];
    for s in &sizes {
        let pos = (s.log10() - log_lo) / span * N_BINS as f64;
        let idx = (pos.max(0.0).floor() as usize).min(N_BINS - 1);
        counts[idx] += 1;
    }

    let width = span / N_BINS as f64;
    let points: Vec<(f64, f64)> = counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .map(|(k, &c)| (log_lo + k as f64 * width, (c as f64).log10()))
        .collect();
    if points.len() < MIN_NONZERO_BINS {
        return None;
    }

    Some(-least_squares_slope(&points))
}

/// Ordinary least-squares slope; 0 when the x values are degenerate.
fn least_squares_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    let (sx, sy, sxy, sxx) = points.iter().fold(
        (0.0, 0.0, 0.0, 0.0),
        |(sx, sy, sxy, sxx), &(x, y)| (sx + x, sy + y, sxy + x * y, sxx + x * x),
    );
    let denom = n * sxx - sx * sx;
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sxy - sx * sy) / denom
}
