#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tachometer engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative session, and the pure simulation systems. Adapters submit
//! [`Command`] values describing throttle input and clock ticks, the session
//! executes those commands via its `apply` entry point, and then broadcasts
//! [`Event`] values describing every state transition it observed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed tuning constants that shape the simulated engine.
///
/// The values returned by [`Tuning::default`] are the only supported
/// configuration; the struct exists so systems receive their constants
/// explicitly instead of reading globals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Resting engine speed the idle oscillator centres on.
    pub idle_rpm: f64,
    /// Amplitude of the idle oscillation in RPM.
    pub idle_wiggle_range: f64,
    /// Duration of one full idle oscillation in milliseconds.
    pub idle_wiggle_period_ms: f64,
    /// Engine speed at and above which the gauge shows a warning.
    pub warn_rpm: f64,
    /// Ceiling at which fuel is cut and acceleration stops.
    pub fuel_cutoff_rpm: f64,
    /// Engine speed the RPM must fall to before fuel is restored.
    pub fuel_cutoff_restart_rpm: f64,
    /// RPM gained per millisecond of open throttle before torque scaling.
    pub throttle_gain: f64,
    /// Exponent applied to the normalised RPM by the torque curve.
    pub torque_exponent: f64,
    /// Span of the torque multiplier above its floor.
    pub torque_span: f64,
    /// Torque multiplier produced at zero RPM.
    pub torque_floor: f64,
    /// Milliseconds of coasting required to ramp the slowdown multiplier by one.
    pub slowdown_ramp_ms: f64,
    /// RPM lost per millisecond of coasting at full slowdown.
    pub coast_gain: f64,
    /// Engine speed above which coasting may reach full slowdown.
    pub slowdown_full_rpm: f64,
    /// Slowdown ceiling applied at zero RPM.
    pub slowdown_floor: f64,
    /// Milliseconds a published peak stays fully visible.
    pub marker_hold_ms: f64,
    /// Milliseconds the peak marker takes to fade out.
    pub marker_fade_ms: f64,
}

impl Tuning {
    /// Canonical engine tuning.
    pub const STANDARD: Self = Self {
        idle_rpm: 800.0,
        idle_wiggle_range: 32.0,
        idle_wiggle_period_ms: 1_400.0,
        warn_rpm: 6_000.0,
        fuel_cutoff_rpm: 7_500.0,
        fuel_cutoff_restart_rpm: 7_100.0,
        throttle_gain: 15.0,
        torque_exponent: 0.76,
        torque_span: 0.6,
        torque_floor: 0.4,
        slowdown_ramp_ms: 240.0,
        coast_gain: 6.0,
        slowdown_full_rpm: 4_000.0,
        slowdown_floor: 0.1,
        marker_hold_ms: 1_000.0,
        marker_fade_ms: 1_000.0,
    };
}

impl Default for Tuning {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Elapsed time of a single clock tick.
///
/// Negative, NaN and infinite inputs collapse to a zero-length frame so a
/// misbehaving clock can never push invalid values into the integrator.
/// Deserialised frames go through the same sanitising.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFrameTime")]
pub struct FrameTime {
    elapsed_ms: f64,
    lag: f64,
}

impl FrameTime {
    /// Frame that advances nothing.
    pub const ZERO: Self = Self {
        elapsed_ms: 0.0,
        lag: 0.0,
    };

    /// Longest frame the integrator accepts; longer stalls are clamped to it.
    pub const MAX_ELAPSED_MS: f64 = 60_000.0;

    /// Creates a frame covering the provided number of milliseconds.
    #[must_use]
    pub fn from_millis(elapsed_ms: f64) -> Self {
        Self {
            elapsed_ms: sanitize_millis(elapsed_ms),
            lag: 0.0,
        }
    }

    /// Creates a frame from a wall-clock duration.
    #[must_use]
    pub fn from_duration(elapsed: Duration) -> Self {
        Self::from_millis(elapsed.as_secs_f64() * 1_000.0)
    }

    /// Attaches the lag reported by the driving clock.
    #[must_use]
    pub fn with_lag(mut self, lag: f64) -> Self {
        self.lag = if lag.is_finite() { lag } else { 0.0 };
        self
    }

    /// Milliseconds covered by the frame, always finite and non-negative.
    #[must_use]
    pub const fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Lag reported by the clock alongside this frame.
    #[must_use]
    pub const fn lag(&self) -> f64 {
        self.lag
    }

    /// Reports whether the frame advances no time at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.elapsed_ms == 0.0
    }
}

fn sanitize_millis(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value.min(FrameTime::MAX_ELAPSED_MS)
    } else {
        0.0
    }
}

#[derive(Deserialize)]
struct RawFrameTime {
    elapsed_ms: f64,
    lag: f64,
}

impl From<RawFrameTime> for FrameTime {
    fn from(raw: RawFrameTime) -> Self {
        Self::from_millis(raw.elapsed_ms).with_lag(raw.lag)
    }
}

/// Point on the session's monotonic simulation clock, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Origin of the simulation clock.
    pub const ZERO: Self = Self(0.0);

    /// Creates a timestamp from milliseconds since the clock origin.
    #[must_use]
    pub const fn from_millis(millis: f64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the clock origin.
    #[must_use]
    pub const fn as_millis(&self) -> f64 {
        self.0
    }

    /// Returns the timestamp reached after the provided frame elapses.
    #[must_use]
    pub fn advanced_by(self, frame: FrameTime) -> Self {
        Self(self.0 + frame.elapsed_ms())
    }

    /// Returns the timestamp lying `millis` after this one.
    #[must_use]
    pub fn offset_by(self, millis: f64) -> Self {
        Self(self.0 + millis)
    }

    /// Milliseconds elapsed between `earlier` and this timestamp.
    #[must_use]
    pub fn millis_since(self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }
}

/// Commands that express all permissible session mutations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Opens the throttle; a level signal, so repeating it is harmless.
    OpenThrottle,
    /// Closes the throttle and publishes the peak reached since the last release.
    CloseThrottle,
    /// Advances the simulation by one clock tick.
    Tick {
        /// Time covered by the tick.
        frame: FrameTime,
    },
}

/// Events broadcast by the session after processing commands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Frame that was integrated.
        frame: FrameTime,
        /// Clock reading after the frame.
        now: Timestamp,
    },
    /// The throttle transitioned from closed to open.
    ThrottleOpened,
    /// The throttle transitioned from open to closed.
    ThrottleClosed,
    /// The RPM hit the cutoff ceiling and fuel was cut.
    FuelCutEngaged {
        /// Engine speed at the moment of the cut, equal to the ceiling.
        rpm: f64,
    },
    /// The RPM fell to the restart threshold and fuel was restored.
    FuelCutReleased {
        /// Engine speed at the moment fuel returned.
        rpm: f64,
    },
    /// Coasting reached idle speed and the idle oscillator restarted.
    IdleEntered {
        /// New phase origin of the idle oscillator.
        at: Timestamp,
    },
    /// A throttle release published a new peak on the marker.
    PeakPublished {
        /// Peak engine speed held by the marker.
        rpm: f64,
        /// Moment the hold ends and the marker starts fading.
        hold_until: Timestamp,
    },
    /// The live needle overtook the marker, which vanished without fading.
    MarkerSuppressed {
        /// Live engine speed that overtook the marker.
        rpm: f64,
    },
    /// The marker hold expired and the fade began.
    MarkerFadeStarted {
        /// Moment the fade completes.
        fade_until: Timestamp,
    },
    /// The fade completed and the marker is hidden.
    MarkerHidden,
}

/// Read-only view of the simulated engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Current engine speed.
    pub rpm: f64,
    /// Whether the driver is holding the throttle open.
    pub throttle_open: bool,
    /// Whether the idle oscillator drives the RPM.
    pub idling: bool,
    /// Whether the fuel cut limiter is engaged.
    pub fuel_cut: bool,
    /// Accumulated coast-down multiplier.
    pub slowdown: f64,
}

/// Visibility phases of the peak marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerPhase {
    /// No peak is displayed.
    Hidden,
    /// A peak is displayed at full opacity while its hold runs.
    Visible,
    /// The peak is still displayed but fading out.
    FadingOut,
}

/// Read-only view of the peak marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerSnapshot {
    /// Active visibility phase.
    pub phase: MarkerPhase,
    /// Peak currently displayed; zero whenever the marker is hidden.
    pub peak_rpm: f64,
    /// Highest RPM reached under throttle since the last publish.
    pub local_peak_rpm: f64,
    /// Moment the hold ends, while visible.
    pub hold_deadline: Option<Timestamp>,
    /// Moment the fade completes, while fading.
    pub fade_deadline: Option<Timestamp>,
}

impl MarkerSnapshot {
    /// Whether the marker currently occupies the gauge, fading or not.
    #[must_use]
    pub const fn visible(&self) -> bool {
        !matches!(self.phase, MarkerPhase::Hidden)
    }

    /// Whether the marker is in its fade-out phase.
    #[must_use]
    pub const fn fading(&self) -> bool {
        matches!(self.phase, MarkerPhase::FadingOut)
    }
}
