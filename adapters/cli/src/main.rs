#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the tachometer in a window or headless.

mod headless;
mod script;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tachometer_core::{Command, Tuning};
use tachometer_rendering::{
    present, Color, DialLayout, InputAdapter, Presentation, RenderingBackend,
};
use tachometer_rendering_macroquad::MacroquadBackend;
use tachometer_session::{self as session, query, Session};
use tracing::info;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

use self::{
    headless::{log_events, HeadlessConfig},
    script::ThrottleScript,
};

/// Script replayed by headless runs when none is given: a two second pull.
const DEFAULT_HEADLESS_SCRIPT: &str = "0:open,2000:close";

#[derive(Parser, Debug)]
#[command(name = "tachometer", version, about = "Engine tachometer simulation")]
struct Args {
    /// Run the simulation without opening a window.
    #[arg(long)]
    headless: bool,

    /// Simulated milliseconds covered by a headless run.
    #[arg(long, default_value_t = 4_000.0)]
    duration_ms: f64,

    /// Fixed frame length used by headless runs, in milliseconds.
    #[arg(long, default_value_t = 16.6)]
    frame_ms: f64,

    /// Throttle script such as `0:open,2000:close`.
    #[arg(long)]
    script: Option<String>,

    /// Write one JSON object per headless frame to stdout.
    #[arg(long)]
    trace_frames: bool,

    /// Synchronise presentation with the display refresh rate.
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true")]
    vsync: bool,

    /// Log the frame rate once per second.
    #[arg(long)]
    show_fps: bool,

    /// Default log directive, e.g. `info` or `tachometer_session=trace`; `RUST_LOG` overrides it.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn log_filter(level: &str) -> Result<EnvFilter> {
    let default = level
        .parse::<Directive>()
        .with_context(|| format!("invalid log level '{level}'"))?;
    Ok(EnvFilter::builder()
        .with_default_directive(default)
        .from_env_lossy())
}

fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(log_filter(level)?)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))
        .context("failed to install log subscriber")
}

fn parse_script(script: Option<&str>) -> Result<Option<ThrottleScript>> {
    script
        .map(|value| {
            value
                .parse::<ThrottleScript>()
                .with_context(|| format!("invalid --script '{value}'"))
        })
        .transpose()
}

fn run_headless(args: &Args, script: Option<ThrottleScript>) -> Result<()> {
    let script = match script {
        Some(script) => script,
        None => DEFAULT_HEADLESS_SCRIPT.parse()?,
    };
    info!(
        steps = script.len(),
        duration_ms = args.duration_ms,
        frame_ms = args.frame_ms,
        "starting headless run"
    );

    let mut session = Session::new();
    let config = HeadlessConfig {
        duration_ms: args.duration_ms,
        frame_ms: args.frame_ms,
    };
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let trace = args.trace_frames.then_some(&mut stdout);
    let summary = headless::run(&mut session, script.into_cursor(), config, trace)?;

    info!(
        frames = summary.frames,
        final_rpm = summary.final_rpm,
        peak_rpm = summary.peak_rpm,
        fuel_cuts = summary.fuel_cuts,
        peaks_published = summary.peaks_published,
        "headless run finished"
    );
    if !args.trace_frames {
        println!(
            "final rpm {:.0}, peak {:.0}, fuel cuts {}, peaks published {}",
            summary.final_rpm, summary.peak_rpm, summary.fuel_cuts, summary.peaks_published
        );
    }

    Ok(())
}

fn run_windowed(args: &Args, script: Option<ThrottleScript>) -> Result<()> {
    let tuning = Tuning::default();
    let dial = DialLayout::for_tuning(&tuning).context("failed to lay out the dial")?;
    let presentation = Presentation::new(
        "Tachometer",
        Color::from_rgb_u8(12, 12, 16),
        dial,
        &tuning,
    );

    let mut session = Session::with_tuning(tuning);
    let mut input = InputAdapter::new();
    let mut script = script.map(ThrottleScript::into_cursor);
    let mut events = Vec::new();

    MacroquadBackend::new()
        .with_vsync(args.vsync)
        .with_show_fps(args.show_fps)
        .run(presentation, move |frame, pointer_events, scene| {
            events.clear();
            for pointer in pointer_events {
                if let Some(command) = input.translate_timed(*pointer) {
                    session::apply(&mut session, command, &mut events);
                }
            }
            if let Some(script) = script.as_mut() {
                for command in script.due(query::now(&session)) {
                    session::apply(&mut session, command, &mut events);
                }
            }
            session::apply(&mut session, Command::Tick { frame }, &mut events);
            log_events(&events);

            present(
                &query::engine(&session),
                &query::marker(&session),
                query::tuning(&session),
                scene,
            );
        })
}

/// Entry point for the tachometer command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;
    let script = parse_script(args.script.as_deref())?;

    if args.headless {
        run_headless(&args, script)
    } else {
        run_windowed(&args, script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arguments_match_documented_values() {
        let args = Args::parse_from(["tachometer"]);
        assert!(!args.headless);
        assert_eq!(args.duration_ms, 4_000.0);
        assert_eq!(args.frame_ms, 16.6);
        assert!(args.vsync);
        assert_eq!(args.log_level, "info");
        assert!(args.script.is_none());
    }

    #[test]
    fn vsync_can_be_disabled() {
        let args = Args::parse_from(["tachometer", "--vsync", "false"]);
        assert!(!args.vsync);
    }

    #[test]
    fn default_headless_script_parses() {
        let script: ThrottleScript = DEFAULT_HEADLESS_SCRIPT.parse().expect("valid default");
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn log_level_must_be_a_single_directive() {
        assert!(log_filter("tachometer_session=trace").is_ok());
        let error = log_filter("tachometer_session=loud").expect_err("unknown level");
        assert!(error.to_string().contains("invalid log level"));
    }

    #[test]
    fn invalid_script_reports_context() {
        let error = parse_script(Some("soon:open")).expect_err("invalid time");
        assert!(error.to_string().contains("--script"));
    }
}
