#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure RPM simulation system driven by a binary throttle.
//!
//! Each tick integrates the engine speed under exactly one regime: throttled
//! acceleration, the idle oscillator, or coast-down. The fuel cut limiter is a
//! modifier on top of those regimes: while engaged it blocks the throttled
//! branch, and it only releases once the RPM has fallen to the restart
//! threshold.

mod torque;

use std::f64::consts::TAU;

use tachometer_core::{EngineSnapshot, FrameTime, Timestamp, Tuning};

pub use self::torque::torque;

/// Regime that drove the RPM during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Throttle open with fuel available; the engine accelerated.
    Throttled,
    /// The idle oscillator positioned the RPM.
    Idling,
    /// The engine decelerated towards idle.
    Coasting,
}

/// Outcome of a single simulation step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Regime that produced the new RPM, or `None` for a zero-length frame.
    pub regime: Option<Regime>,
    /// Engine speed after the step.
    pub rpm: f64,
    /// Whether this step hit the ceiling and cut fuel.
    pub fuel_cut_engaged: bool,
    /// Whether this step dropped to the restart threshold and restored fuel.
    pub fuel_cut_released: bool,
    /// Whether this step coasted down to idle and restarted the oscillator.
    pub idle_entered: bool,
}

impl StepReport {
    fn new(regime: Regime, rpm: f64) -> Self {
        Self {
            regime: Some(regime),
            rpm,
            fuel_cut_engaged: false,
            fuel_cut_released: false,
            idle_entered: false,
        }
    }

    fn skipped(rpm: f64) -> Self {
        Self {
            regime: None,
            rpm,
            fuel_cut_engaged: false,
            fuel_cut_released: false,
            idle_entered: false,
        }
    }
}

/// Simulated engine owning RPM, throttle, idle and fuel cut state.
#[derive(Clone, Debug)]
pub struct RpmSimulator {
    tuning: Tuning,
    rpm: f64,
    throttle_open: bool,
    idling: bool,
    idle_start: Timestamp,
    fuel_cut: bool,
    slowdown: f64,
}

impl RpmSimulator {
    /// Creates an idling engine whose oscillator phase starts at the clock origin.
    #[must_use]
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            rpm: tuning.idle_rpm,
            throttle_open: false,
            idling: true,
            idle_start: Timestamp::ZERO,
            fuel_cut: false,
            slowdown: 0.0,
        }
    }

    /// Opens the throttle, returning `true` when it was previously closed.
    pub fn open_throttle(&mut self) -> bool {
        let changed = !self.throttle_open;
        self.throttle_open = true;
        changed
    }

    /// Closes the throttle, returning `true` when it was previously open.
    pub fn close_throttle(&mut self) -> bool {
        let changed = self.throttle_open;
        self.throttle_open = false;
        changed
    }

    /// Current engine speed.
    #[must_use]
    pub const fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Whether the fuel cut limiter is engaged.
    #[must_use]
    pub const fn fuel_cut(&self) -> bool {
        self.fuel_cut
    }

    /// Captures a read-only view of the engine.
    #[must_use]
    pub const fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            rpm: self.rpm,
            throttle_open: self.throttle_open,
            idling: self.idling,
            fuel_cut: self.fuel_cut,
            slowdown: self.slowdown,
        }
    }

    /// Advances the engine by one frame ending at `now`.
    ///
    /// Zero-length frames leave every field untouched.
    pub fn step(&mut self, frame: FrameTime, now: Timestamp) -> StepReport {
        let dt = frame.elapsed_ms();
        if !(dt.is_finite() && dt > 0.0) {
            return StepReport::skipped(self.rpm);
        }

        if self.throttle_open && !self.fuel_cut {
            return self.accelerate(dt);
        }

        let mut report = if self.idling {
            self.rpm = self.idle_rpm_at(now);
            StepReport::new(Regime::Idling, self.rpm)
        } else {
            self.coast(dt, now)
        };

        if self.fuel_cut && self.rpm <= self.tuning.fuel_cutoff_restart_rpm {
            self.fuel_cut = false;
            report.fuel_cut_released = true;
        }
        report.rpm = self.rpm;
        report
    }

    fn accelerate(&mut self, dt: f64) -> StepReport {
        self.idling = false;
        self.slowdown = 0.0;
        self.rpm += dt * self.tuning.throttle_gain * torque(self.rpm, &self.tuning);

        let mut report = StepReport::new(Regime::Throttled, self.rpm);
        if self.rpm > self.tuning.fuel_cutoff_rpm {
            self.fuel_cut = true;
            self.rpm = self.tuning.fuel_cutoff_rpm;
            report.fuel_cut_engaged = true;
            report.rpm = self.rpm;
        }
        report
    }

    fn coast(&mut self, dt: f64, now: Timestamp) -> StepReport {
        self.slowdown = (self.slowdown + dt / self.tuning.slowdown_ramp_ms).min(self.max_slowdown());
        self.rpm -= dt * self.tuning.coast_gain * self.slowdown;

        let mut report = StepReport::new(Regime::Coasting, self.rpm);
        if self.rpm <= self.tuning.idle_rpm {
            self.rpm = self.tuning.idle_rpm;
            self.idling = true;
            self.idle_start = now;
            report.idle_entered = true;
        }
        report
    }

    // Gentle near idle, full strength above `slowdown_full_rpm`.
    fn max_slowdown(&self) -> f64 {
        let tuning = &self.tuning;
        if self.rpm > tuning.slowdown_full_rpm {
            1.0
        } else {
            self.rpm / tuning.slowdown_full_rpm * (1.0 - tuning.slowdown_floor)
                + tuning.slowdown_floor
        }
    }

    fn idle_rpm_at(&self, now: Timestamp) -> f64 {
        let period = self.tuning.idle_wiggle_period_ms;
        let phase = now.millis_since(self.idle_start).rem_euclid(period) / period;
        self.tuning.idle_rpm - (phase * TAU).sin() * self.tuning.idle_wiggle_range
    }
}

impl Default for RpmSimulator {
    fn default() -> Self {
        Self::new(Tuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(millis: f64) -> FrameTime {
        FrameTime::from_millis(millis)
    }

    #[test]
    fn zero_length_frames_are_ignored() {
        let mut engine = RpmSimulator::default();
        let _ = engine.open_throttle();
        let before = engine.snapshot();

        let report = engine.step(FrameTime::from_millis(f64::NAN), Timestamp::from_millis(10.0));

        assert_eq!(report.regime, None);
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn opening_throttle_leaves_idle_and_resets_slowdown() {
        let mut engine = RpmSimulator::default();
        engine.slowdown = 0.5;
        assert!(engine.open_throttle());
        assert!(!engine.open_throttle());

        let report = engine.step(frame(10.0), Timestamp::from_millis(10.0));

        assert_eq!(report.regime, Some(Regime::Throttled));
        assert!(!engine.idling);
        assert_eq!(engine.slowdown, 0.0);
        let expected = 800.0 + 10.0 * 15.0 * torque(800.0, &Tuning::default());
        assert!((engine.rpm() - expected).abs() < 1e-9);
    }

    #[test]
    fn max_slowdown_scales_below_threshold() {
        let mut engine = RpmSimulator::default();
        engine.rpm = 2_000.0;
        assert!((engine.max_slowdown() - 0.55).abs() < 1e-12);
        engine.rpm = 5_000.0;
        assert_eq!(engine.max_slowdown(), 1.0);
    }

    #[test]
    fn slowdown_is_capped_by_current_rpm() {
        let mut engine = RpmSimulator::default();
        engine.idling = false;
        engine.rpm = 1_000.0;
        engine.slowdown = 0.9;

        let _ = engine.step(frame(100.0), Timestamp::from_millis(100.0));

        let cap = 1_000.0 / 4_000.0 * 0.9 + 0.1;
        assert!((engine.slowdown - cap).abs() < 1e-12);
        assert!((engine.rpm() - (1_000.0 - 100.0 * 6.0 * cap)).abs() < 1e-9);
    }

    #[test]
    fn idle_oscillator_dips_at_quarter_period() {
        let mut engine = RpmSimulator::default();
        let report = engine.step(frame(350.0), Timestamp::from_millis(350.0));

        assert_eq!(report.regime, Some(Regime::Idling));
        assert!((engine.rpm() - 768.0).abs() < 1e-9);
    }
}
