//! Torque response curve used while the throttle is open.

use tachometer_core::Tuning;

/// Maps the current engine speed onto a dimensionless acceleration multiplier.
///
/// The curve starts at `torque_floor` for a stalled engine and rises
/// monotonically to `torque_floor + torque_span` at the fuel cutoff. Callers
/// must pass a non-negative `rpm`.
#[must_use]
pub fn torque(rpm: f64, tuning: &Tuning) -> f64 {
    (rpm / tuning.fuel_cutoff_rpm).powf(tuning.torque_exponent) * tuning.torque_span
        + tuning.torque_floor
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stalled_engine_still_pulls() {
        assert_eq!(torque(0.0, &Tuning::default()), 0.4);
    }

    #[test]
    fn cutoff_reaches_full_torque() {
        let tuning = Tuning::default();
        assert!((torque(tuning.fuel_cutoff_rpm, &tuning) - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn torque_stays_within_bounds(rpm in 0.0..=7_500.0f64) {
            let value = torque(rpm, &Tuning::default());
            prop_assert!(value >= 0.4);
            prop_assert!(value <= 1.0 + 1e-12);
        }

        #[test]
        fn torque_never_decreases(a in 0.0..=7_500.0f64, b in 0.0..=7_500.0f64) {
            let tuning = Tuning::default();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(torque(low, &tuning) <= torque(high, &tuning));
        }
    }
}
