// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Valley-Ascent Escape
// ─────────────────────────────────────────────────────────────────────
//! Detects a plateau stuck away from the target and deliberately lowers
//! coherence a bounded amount before climbing toward a higher estimated
//! maximum.
//!
//! Plateau: the last 10 errors have population variance < 0.001 while
//! the latest |error| > 0.05. The estimated maximum is then
//! `measurement + |error|`.

use serde::{Deserialize, Serialize};

use homeostat_types::RingBuffer;

const PLATEAU_WINDOW: usize = 10;
const PLATEAU_VARIANCE: f64 = 0.001;
const PLATEAU_MIN_ERROR: f64 = 0.05;
/// Descent is never started from below this coherence.
const DESCENT_SAFETY_FLOOR: f64 = 0.5;
const DESCENT_PUSH: f64 = 0.5;
const ASCENT_EASE: f64 = -0.3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValleyAscentState {
    pub in_descent: bool,
    pub descent_start_measurement: f64,
    pub descent_depth: f64,
    pub max_descent_depth: f64,
    pub ascent_target: f64,
    pub ascent_progress: f64,
    pub local_optimum_detected: bool,
    pub global_maximum_estimate: f64,
}

pub struct ValleyAscentController {
    state: ValleyAscentState,
}

impl ValleyAscentController {
    pub fn new(max_descent_depth: f64) -> Self {
        Self {
            state: ValleyAscentState {
                max_descent_depth,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> &ValleyAscentState {
        &self.state
    }

    /// Forget any detected optimum and abandon an ongoing descent.
    pub fn reset(&mut self) {
        self.state = ValleyAscentState {
            max_descent_depth: self.state.max_descent_depth,
            ..Default::default()
        };
    }

    /// Plateau detection over the most recent errors.
    pub fn detect_local_optimum(&mut self, measurement: f64, errors: &RingBuffer<f64>) -> bool {
        if errors.len() < PLATEAU_WINDOW {
            return false;
        }
        let recent: Vec<f64> = errors.tail(PLATEAU_WINDOW).copied().collect();
        let mean = recent.iter().sum::<f64>() / PLATEAU_WINDOW as f64;
        let variance =
            recent.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / PLATEAU_WINDOW as f64;
        let current_error = recent[PLATEAU_WINDOW - 1];

        if variance < PLATEAU_VARIANCE && current_error.abs() > PLATEAU_MIN_ERROR {
            self.state.local_optimum_detected = true;
            self.state.global_maximum_estimate = measurement + current_error.abs();
            log::debug!(
                "valley: plateau at {measurement:.4}, estimated maximum {:.4}",
                self.state.global_maximum_estimate
            );
            return true;
        }
        false
    }

    /// Multiplicative guidance adjustment for this tick.
    ///
    /// +0.5 while descending, -0.3 on the tick the descent reaches
    /// `max_descent_depth`, 0 otherwise. After a descent the climb toward
    /// the estimated maximum is tracked in `ascent_progress`.
    pub fn compute_adjustment(&mut self, measurement: f64, errors: &RingBuffer<f64>) -> f64 {
        self.detect_local_optimum(measurement, errors);

        let s = &mut self.state;
        if s.local_optimum_detected && !s.in_descent && measurement > DESCENT_SAFETY_FLOOR {
            s.in_descent = true;
            s.descent_start_measurement = measurement;
            s.ascent_target = s.global_maximum_estimate;
            log::info!(
                "valley: starting descent from {measurement:.4} toward {:.4}",
                s.ascent_target
            );
        }

        if s.in_descent {
            s.descent_depth = s.descent_start_measurement - measurement;
            if s.descent_depth >= s.max_descent_depth {
                s.in_descent = false;
                s.local_optimum_detected = false;
                log::info!(
                    "valley: descent reached depth {:.4}, switching to ascent",
                    s.descent_depth
                );
                return ASCENT_EASE;
            }
            return DESCENT_PUSH;
        }

        if s.ascent_target > 0.0 {
            let climb = s.ascent_target - s.descent_start_measurement;
            s.ascent_progress = if climb == 0.0 {
                0.0
            } else {
                (measurement - s.descent_start_measurement) / climb
            };
            if measurement >= s.ascent_target {
                s.ascent_target = 0.0;
                s.ascent_progress = 0.0;
            }
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_errors(value: f64, n: usize) -> RingBuffer<f64> {
        let mut ring = RingBuffer::new(100).unwrap();
        for _ in 0..n {
            ring.push(value);
        }
        ring
    }

    // ── Detection ─────────────────────────────────────────────────

    #[test]
    fn test_short_history_no_detection() {
        let mut v = ValleyAscentController::new(0.2);
        assert!(!v.detect_local_optimum(0.6, &flat_errors(0.1, 9)));
    }

    #[test]
    fn test_plateau_detected() {
        let mut v = ValleyAscentController::new(0.2);
        assert!(v.detect_local_optimum(0.6, &flat_errors(0.1, 10)));
        assert!(v.state().local_optimum_detected);
        assert!((v.state().global_maximum_estimate - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_small_error_plateau_ignored() {
        let mut v = ValleyAscentController::new(0.2);
        assert!(!v.detect_local_optimum(0.68, &flat_errors(0.02, 20)));
    }

    #[test]
    fn test_noisy_history_ignored() {
        let mut v = ValleyAscentController::new(0.2);
        assert!(!v.detect_local_optimum(0.6, &noisy_errors()));
    }

    // ── Descent / ascent ──────────────────────────────────────────

    fn noisy_errors() -> RingBuffer<f64> {
        let mut ring = RingBuffer::new(20).unwrap();
        for i in 0..10 {
            ring.push(if i % 2 == 0 { 0.2 } else { -0.2 });
        }
        ring
    }

    #[test]
    fn test_full_descent_cycle() {
        let mut v = ValleyAscentController::new(0.2);
        let flat = flat_errors(0.1, 10);

        assert_eq!(v.compute_adjustment(0.6, &flat), 0.5);
        assert!(v.state().in_descent);
        assert_eq!(v.state().descent_start_measurement, 0.6);
        assert!((v.state().ascent_target - 0.7).abs() < 1e-12);

        assert_eq!(v.compute_adjustment(0.55, &flat), 0.5);
        assert_eq!(v.compute_adjustment(0.45, &flat), 0.5);

        // depth 0.6 - 0.35 = 0.25 >= 0.2
        assert_eq!(v.compute_adjustment(0.35, &flat), -0.3);
        assert!(!v.state().in_descent);
        assert!(!v.state().local_optimum_detected);

        // Climbing back: (0.5 - 0.6) / (0.7 - 0.6)
        assert_eq!(v.compute_adjustment(0.5, &noisy_errors()), 0.0);
        let p = v.state().ascent_progress;
        assert!((p + 1.0).abs() < 1e-9, "progress={p}");

        // Target reached: ascent bookkeeping cleared.
        assert_eq!(v.compute_adjustment(0.72, &noisy_errors()), 0.0);
        assert_eq!(v.state().ascent_target, 0.0);
        assert_eq!(v.state().ascent_progress, 0.0);
    }

    #[test]
    fn test_no_descent_below_safety_floor() {
        let mut v = ValleyAscentController::new(0.2);
        let errors = flat_errors(0.3, 10);
        assert_eq!(v.compute_adjustment(0.4, &errors), 0.0);
        assert!(v.state().local_optimum_detected);
        assert!(!v.state().in_descent);
    }

    #[test]
    fn test_zero_climb_progress() {
        let mut v = ValleyAscentController::new(0.2);
        v.state.descent_start_measurement = 0.6;
        v.state.ascent_target = 0.6;
        assert_eq!(v.compute_adjustment(0.3, &noisy_errors()), 0.0);
        assert_eq!(v.state().ascent_progress, 0.0);
        assert!(v.state().ascent_progress.is_finite());
    }

    #[test]
    fn test_quiet_loop_no_adjustment() {
        let mut v = ValleyAscentController::new(0.2);
        for _ in 0..20 {
            assert_eq!(v.compute_adjustment(0.7, &noisy_errors()), 0.0);
        }
        assert_eq!(*v.state(), ValleyAscentState {
            max_descent_depth: 0.2,
            ..Default::default()
        });
    }

    #[test]
    fn test_reset_keeps_depth_limit() {
        let mut v = ValleyAscentController::new(0.15);
        v.compute_adjustment(0.6, &flat_errors(0.1, 10));
        v.reset();
        assert!(!v.state().in_descent);
        assert_eq!(v.state().max_descent_depth, 0.15);
    }
}
