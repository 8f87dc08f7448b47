#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative tachometer session state.
//!
//! A [`Session`] owns the simulated engine, the peak marker and the tuning
//! they share. Every mutation flows through [`apply`], which executes one
//! [`Command`] synchronously and reports the resulting transitions as
//! [`Event`] values. Hold and fade expiry are polled at the start of each
//! tick, so input commands and clock ticks are the only entry points.

use tachometer_core::{Command, Event, FrameTime, Timestamp, Tuning};
use tachometer_system_peak_marker::{Config as MarkerConfig, MarkerTransition, PeakMarker};
use tachometer_system_simulator::{Regime, RpmSimulator};
use tracing::{debug, trace};

/// Represents the authoritative tachometer state.
#[derive(Debug)]
pub struct Session {
    tuning: Tuning,
    engine: RpmSimulator,
    marker: PeakMarker,
    now: Timestamp,
    scratch: Vec<MarkerTransition>,
}

impl Session {
    /// Creates an idling session using the standard tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tuning(Tuning::default())
    }

    /// Creates an idling session using the provided tuning.
    #[must_use]
    pub fn with_tuning(tuning: Tuning) -> Self {
        Self {
            tuning,
            engine: RpmSimulator::new(tuning),
            marker: PeakMarker::new(MarkerConfig::from(&tuning)),
            now: Timestamp::ZERO,
            scratch: Vec::new(),
        }
    }

    fn tick(&mut self, frame: FrameTime, out_events: &mut Vec<Event>) {
        self.now = self.now.advanced_by(frame);
        out_events.push(Event::TimeAdvanced {
            frame,
            now: self.now,
        });

        self.scratch.clear();
        self.marker.poll(self.now, &mut self.scratch);
        for transition in self.scratch.drain(..) {
            out_events.push(marker_event(transition));
        }

        let report = self.engine.step(frame, self.now);
        trace!(
            rpm = report.rpm,
            elapsed_ms = frame.elapsed_ms(),
            lag = frame.lag(),
            regime = ?report.regime,
            "engine stepped"
        );

        if report.regime == Some(Regime::Throttled) {
            if let Some(transition) = self.marker.observe_throttled_rpm(report.rpm) {
                debug!(rpm = report.rpm, "needle overtook peak marker");
                out_events.push(marker_event(transition));
            }
        }

        if report.fuel_cut_engaged {
            debug!(rpm = report.rpm, "fuel cut engaged");
            out_events.push(Event::FuelCutEngaged { rpm: report.rpm });
        }
        if report.fuel_cut_released {
            debug!(rpm = report.rpm, "fuel cut released");
            out_events.push(Event::FuelCutReleased { rpm: report.rpm });
        }
        if report.idle_entered {
            debug!(at = self.now.as_millis(), "engine settled at idle");
            out_events.push(Event::IdleEntered { at: self.now });
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn marker_event(transition: MarkerTransition) -> Event {
    match transition {
        MarkerTransition::Published { rpm, hold_until } => Event::PeakPublished { rpm, hold_until },
        MarkerTransition::Suppressed { rpm } => Event::MarkerSuppressed { rpm },
        MarkerTransition::FadeStarted { fade_until } => Event::MarkerFadeStarted { fade_until },
        MarkerTransition::Hidden => Event::MarkerHidden,
    }
}

/// Applies the provided command to the session, mutating state deterministically.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::OpenThrottle => {
            if session.engine.open_throttle() {
                out_events.push(Event::ThrottleOpened);
            }
        }
        Command::CloseThrottle => {
            if session.engine.close_throttle() {
                out_events.push(Event::ThrottleClosed);
            }
            if let Some(transition) = session.marker.publish(session.now) {
                debug!(peak = session.marker.peak_rpm(), "peak marker published");
                out_events.push(marker_event(transition));
            }
        }
        Command::Tick { frame } => session.tick(frame, out_events),
    }
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use super::Session;
    use tachometer_core::{EngineSnapshot, MarkerSnapshot, Timestamp, Tuning};

    /// Captures a read-only view of the simulated engine.
    #[must_use]
    pub fn engine(session: &Session) -> EngineSnapshot {
        session.engine.snapshot()
    }

    /// Captures a read-only view of the peak marker.
    #[must_use]
    pub fn marker(session: &Session) -> MarkerSnapshot {
        session.marker.snapshot()
    }

    /// Provides read-only access to the tuning the session was created with.
    #[must_use]
    pub fn tuning(session: &Session) -> &Tuning {
        &session.tuning
    }

    /// Current reading of the simulation clock.
    #[must_use]
    pub fn now(session: &Session) -> Timestamp {
        session.now
    }
}
