//! Fixed-step driver that runs the session without a window.

use std::io::Write;

use anyhow::{ensure, Context, Result};
use serde::Serialize;
use tachometer_core::{Command, Event, FrameTime, MarkerPhase};
use tachometer_rendering::{present, GaugeScene};
use tachometer_session::{self as session, query, Session};
use tracing::{debug, info};

use crate::script::ScriptCursor;

/// Parameters of a headless run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct HeadlessConfig {
    pub(crate) duration_ms: f64,
    pub(crate) frame_ms: f64,
}

/// Totals gathered over a headless run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) frames: u64,
    pub(crate) final_rpm: f64,
    pub(crate) peak_rpm: f64,
    pub(crate) fuel_cuts: u32,
    pub(crate) peaks_published: u32,
}

/// One line of `--trace-frames` output.
#[derive(Clone, Copy, Debug, Serialize)]
struct FrameTrace {
    t_ms: f64,
    rpm: f64,
    throttle_open: bool,
    idling: bool,
    fuel_cut: bool,
    needle_angle: f64,
    needle_warning: bool,
    marker_phase: MarkerPhase,
    marker_rpm: f64,
    marker_angle: f64,
}

/// Runs `session` for the configured duration, replaying `script` on the way.
///
/// When `trace` is provided, one JSON object per frame is written to it.
pub(crate) fn run<W>(
    session: &mut Session,
    mut script: ScriptCursor,
    config: HeadlessConfig,
    mut trace: Option<&mut W>,
) -> Result<RunSummary>
where
    W: Write,
{
    ensure!(
        config.frame_ms.is_finite() && config.frame_ms > 0.0,
        "frame length must be a positive number of milliseconds (received {})",
        config.frame_ms
    );
    ensure!(
        config.duration_ms.is_finite() && config.duration_ms >= 0.0,
        "duration must be a non-negative number of milliseconds (received {})",
        config.duration_ms
    );

    let frame = FrameTime::from_millis(config.frame_ms);
    let mut summary = RunSummary::default();
    let mut scene = GaugeScene::new();
    let mut events = Vec::new();

    while query::now(session).as_millis() < config.duration_ms {
        events.clear();
        let now = query::now(session);
        for command in script.due(now) {
            info!(at_ms = now.as_millis(), ?command, "scripted throttle action");
            session::apply(session, command, &mut events);
        }
        session::apply(session, Command::Tick { frame }, &mut events);
        log_events(&events);

        for event in &events {
            match event {
                Event::FuelCutEngaged { .. } => summary.fuel_cuts += 1,
                Event::PeakPublished { .. } => summary.peaks_published += 1,
                _ => {}
            }
        }

        let engine = query::engine(session);
        let marker = query::marker(session);
        present(&engine, &marker, query::tuning(session), &mut scene);

        summary.frames += 1;
        summary.final_rpm = engine.rpm;
        summary.peak_rpm = summary.peak_rpm.max(engine.rpm);

        if let Some(out) = trace.as_mut() {
            let line = FrameTrace {
                t_ms: query::now(session).as_millis(),
                rpm: engine.rpm,
                throttle_open: engine.throttle_open,
                idling: engine.idling,
                fuel_cut: engine.fuel_cut,
                needle_angle: scene.needle.angle_degrees,
                needle_warning: scene.needle.warning,
                marker_phase: marker.phase,
                marker_rpm: marker.peak_rpm,
                marker_angle: scene.marker.angle_degrees,
            };
            serde_json::to_writer(&mut **out, &line).context("failed to encode frame trace")?;
            writeln!(out).context("failed to write frame trace")?;
        }
    }

    Ok(summary)
}

/// Logs the transitions in `events`; clock ticks are left out.
pub(crate) fn log_events(events: &[Event]) {
    for event in events {
        match *event {
            Event::TimeAdvanced { .. } => {}
            Event::ThrottleOpened => debug!("throttle opened"),
            Event::ThrottleClosed => debug!("throttle closed"),
            Event::FuelCutEngaged { rpm } => info!(rpm, "fuel cut engaged"),
            Event::FuelCutReleased { rpm } => info!(rpm, "fuel cut released"),
            Event::IdleEntered { at } => info!(at_ms = at.as_millis(), "engine back at idle"),
            Event::PeakPublished { rpm, hold_until } => info!(
                rpm,
                hold_until_ms = hold_until.as_millis(),
                "peak marker published"
            ),
            Event::MarkerSuppressed { rpm } => info!(rpm, "needle overtook peak marker"),
            Event::MarkerFadeStarted { fade_until } => debug!(
                fade_until_ms = fade_until.as_millis(),
                "peak marker fading"
            ),
            Event::MarkerHidden => debug!("peak marker hidden"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ThrottleScript;

    fn cursor(script: &str) -> ScriptCursor {
        script
            .parse::<ThrottleScript>()
            .expect("valid script")
            .into_cursor()
    }

    fn config(duration_ms: f64) -> HeadlessConfig {
        HeadlessConfig {
            duration_ms,
            frame_ms: 16.6,
        }
    }

    #[test]
    fn demo_script_hits_limiter_and_publishes_peak() {
        let mut session = Session::new();
        let summary = run::<Vec<u8>>(
            &mut session,
            cursor("0:open,2000:close"),
            config(2_500.0),
            None,
        )
        .expect("headless run");

        assert_eq!(summary.peak_rpm, 7_500.0);
        assert!(summary.fuel_cuts >= 1);
        assert_eq!(summary.peaks_published, 1);
        assert!(summary.final_rpm < 7_500.0);
        assert!(summary.frames > 100);
    }

    #[test]
    fn idle_run_stays_near_idle() {
        let mut session = Session::new();
        let summary = run::<Vec<u8>>(&mut session, cursor(""), config(3_000.0), None)
            .expect("headless run");

        assert!(summary.peak_rpm <= 832.0);
        assert_eq!(summary.fuel_cuts, 0);
        assert_eq!(summary.peaks_published, 0);
    }

    #[test]
    fn trace_emits_one_json_object_per_frame() {
        let mut session = Session::new();
        let mut trace = Vec::new();
        let summary = run(
            &mut session,
            cursor("0:open,300:close"),
            config(500.0),
            Some(&mut trace),
        )
        .expect("headless run");

        let text = String::from_utf8(trace).expect("utf8 trace");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len() as u64, summary.frames);
        assert_eq!(lines[0]["throttle_open"], serde_json::Value::Bool(true));
        let last = lines.last().expect("at least one frame");
        assert_eq!(last["marker_phase"], serde_json::json!("Visible"));
        assert!(last["marker_rpm"].as_f64().expect("number") > 800.0);
    }

    #[test]
    fn rejects_non_positive_frame_length() {
        let mut session = Session::new();
        let error = run::<Vec<u8>>(
            &mut session,
            cursor(""),
            HeadlessConfig {
                duration_ms: 100.0,
                frame_ms: 0.0,
            },
            None,
        )
        .expect_err("zero frame length must be rejected");
        assert!(error.to_string().contains("frame length"));
    }
}
