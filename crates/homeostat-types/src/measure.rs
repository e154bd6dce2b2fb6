// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Measurement Helpers
// ─────────────────────────────────────────────────────────────────────

use crate::error::{HomeostatError, HomeostatResult};

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_bounded(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_bounded: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_bounded: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Reject NaN/Inf inputs at the call that introduced them.
pub fn require_finite(name: &str, value: f64) -> HomeostatResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(HomeostatError::InvalidParameter(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

/// Reject values outside the unit interval (NaN included).
pub fn require_unit(name: &str, value: f64) -> HomeostatResult<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(HomeostatError::InvalidParameter(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_nan() {
        assert_eq!(clamp_bounded(f64::NAN, 0.1, 2.0), 0.1);
    }

    #[test]
    fn test_clamp_pos_inf() {
        assert_eq!(clamp_bounded(f64::INFINITY, 0.1, 2.0), 2.0);
    }

    #[test]
    fn test_clamp_neg_inf() {
        assert_eq!(clamp_bounded(f64::NEG_INFINITY, 0.1, 2.0), 0.1);
    }

    #[test]
    fn test_clamp_inside() {
        assert_eq!(clamp_bounded(0.75, 0.1, 2.0), 0.75);
    }

    #[test]
    fn test_require_finite() {
        assert!(require_finite("m", 0.3).is_ok());
        assert!(matches!(
            require_finite("m", f64::NAN),
            Err(HomeostatError::InvalidParameter(_))
        ));
        assert!(require_finite("m", f64::INFINITY).is_err());
    }

    #[test]
    fn test_require_unit() {
        assert!(require_unit("target", 0.0).is_ok());
        assert!(require_unit("target", 1.0).is_ok());
        assert!(require_unit("target", 1.01).is_err());
        assert!(require_unit("target", f64::NAN).is_err());
    }
}
