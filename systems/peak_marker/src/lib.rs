#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Peak-hold marker that remembers the highest RPM reached before a throttle release.
//!
//! The marker has no timers of its own. Hold and fade expiry are stored as
//! deadlines on the simulation clock and resolved by [`PeakMarker::poll`],
//! which the owning session calls at the start of every tick.

use tachometer_core::{MarkerPhase, MarkerSnapshot, Timestamp, Tuning};

/// Configuration parameters required to construct the marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    hold_ms: f64,
    fade_ms: f64,
}

impl Config {
    /// Creates a new configuration using the provided hold and fade durations.
    #[must_use]
    pub const fn new(hold_ms: f64, fade_ms: f64) -> Self {
        Self { hold_ms, fade_ms }
    }
}

impl From<&Tuning> for Config {
    fn from(tuning: &Tuning) -> Self {
        Self::new(tuning.marker_hold_ms, tuning.marker_fade_ms)
    }
}

/// State change reported by the marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerTransition {
    /// A new peak was captured and is held until the provided deadline.
    Published {
        /// Peak now displayed.
        rpm: f64,
        /// End of the hold period.
        hold_until: Timestamp,
    },
    /// The live RPM overtook the displayed peak; the marker vanished without fading.
    Suppressed {
        /// Live RPM that overtook the marker.
        rpm: f64,
    },
    /// The hold expired and the marker began fading.
    FadeStarted {
        /// End of the fade period.
        fade_until: Timestamp,
    },
    /// The fade completed.
    Hidden,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Hidden,
    Visible { hold_until: Timestamp },
    FadingOut { fade_until: Timestamp },
}

/// Peak-hold marker state machine.
#[derive(Clone, Debug)]
pub struct PeakMarker {
    config: Config,
    phase: Phase,
    peak_rpm: f64,
    local_peak_rpm: f64,
}

impl PeakMarker {
    /// Creates a hidden marker with no recorded peak.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            phase: Phase::Hidden,
            peak_rpm: 0.0,
            local_peak_rpm: 0.0,
        }
    }

    /// Publishes the running peak, as happens whenever the throttle closes.
    ///
    /// Nothing happens unless the running peak is positive and at least as high
    /// as the peak already on display. A successful publish restarts the hold
    /// from scratch, cancelling any hold or fade in progress.
    pub fn publish(&mut self, now: Timestamp) -> Option<MarkerTransition> {
        if self.local_peak_rpm <= 0.0 || self.local_peak_rpm < self.peak_rpm {
            return None;
        }

        self.peak_rpm = self.local_peak_rpm;
        self.local_peak_rpm = 0.0;
        let hold_until = now.offset_by(self.config.hold_ms);
        self.phase = Phase::Visible { hold_until };

        Some(MarkerTransition::Published {
            rpm: self.peak_rpm,
            hold_until,
        })
    }

    /// Feeds the RPM produced by a throttled simulation step.
    ///
    /// Returns [`MarkerTransition::Suppressed`] when the live needle overtook a
    /// displayed peak.
    pub fn observe_throttled_rpm(&mut self, rpm: f64) -> Option<MarkerTransition> {
        let suppressed = if self.phase != Phase::Hidden && rpm > self.peak_rpm {
            self.phase = Phase::Hidden;
            self.peak_rpm = 0.0;
            Some(MarkerTransition::Suppressed { rpm })
        } else {
            None
        };

        if rpm > self.local_peak_rpm {
            self.local_peak_rpm = rpm;
        }

        suppressed
    }

    /// Resolves every hold or fade deadline that has passed by `now`.
    pub fn poll(&mut self, now: Timestamp, out: &mut Vec<MarkerTransition>) {
        loop {
            match self.phase {
                Phase::Visible { hold_until } if now >= hold_until => {
                    // Chained from the deadline so the cycle length ignores tick granularity.
                    let fade_until = hold_until.offset_by(self.config.fade_ms);
                    self.phase = Phase::FadingOut { fade_until };
                    out.push(MarkerTransition::FadeStarted { fade_until });
                }
                Phase::FadingOut { fade_until } if now >= fade_until => {
                    self.phase = Phase::Hidden;
                    self.peak_rpm = 0.0;
                    self.local_peak_rpm = 0.0;
                    out.push(MarkerTransition::Hidden);
                }
                _ => return,
            }
        }
    }

    /// Peak currently displayed, zero when hidden.
    #[must_use]
    pub const fn peak_rpm(&self) -> f64 {
        self.peak_rpm
    }

    /// Captures a read-only view of the marker.
    #[must_use]
    pub fn snapshot(&self) -> MarkerSnapshot {
        let (phase, hold_deadline, fade_deadline) = match self.phase {
            Phase::Hidden => (MarkerPhase::Hidden, None, None),
            Phase::Visible { hold_until } => (MarkerPhase::Visible, Some(hold_until), None),
            Phase::FadingOut { fade_until } => (MarkerPhase::FadingOut, None, Some(fade_until)),
        };

        MarkerSnapshot {
            phase,
            peak_rpm: self.peak_rpm,
            local_peak_rpm: self.local_peak_rpm,
            hold_deadline,
            fade_deadline,
        }
    }
}

impl Default for PeakMarker {
    fn default() -> Self {
        Self::new(Config::from(&Tuning::default()))
    }
}
