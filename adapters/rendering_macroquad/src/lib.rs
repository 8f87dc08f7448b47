#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for the tachometer gauge.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.

mod dial;

use self::dial::{draw_face, draw_marker, draw_needle, draw_ticks, draw_warn_arc, DialMetrics};
use anyhow::Result;
use macroquad::input::{
    is_key_pressed, is_mouse_button_pressed, is_mouse_button_released, touches, KeyCode,
    MouseButton, TouchPhase,
};
use std::time::Duration;
use tachometer_core::FrameTime;
use tachometer_rendering::{
    Color, GaugeScene, PointerEvent, Presentation, RenderingBackend, TimedPointerEvent,
};
use tracing::info;

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
        }
    }
}

/// Pointer activity observed during a single frame.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PointerObservations {
    /// Left mouse button went down.
    pub mouse_pressed: bool,
    /// Left mouse button went up.
    pub mouse_released: bool,
    /// Touches that began.
    pub touches_started: usize,
    /// Touches that ended or were cancelled.
    pub touches_ended: usize,
}

impl PointerObservations {
    fn poll() -> Self {
        let mut observations = Self {
            mouse_pressed: is_mouse_button_pressed(MouseButton::Left),
            mouse_released: is_mouse_button_released(MouseButton::Left),
            ..Self::default()
        };
        for touch in touches() {
            match touch.phase {
                TouchPhase::Started => observations.touches_started += 1,
                TouchPhase::Ended | TouchPhase::Cancelled => observations.touches_ended += 1,
                TouchPhase::Moved | TouchPhase::Stationary => {}
            }
        }
        observations
    }

    /// Orders the observations into events stamped with `at`.
    ///
    /// Touch events precede mouse events so mouse events synthesised from a
    /// touch in the same frame fall inside the touch guard.
    #[must_use]
    pub fn into_events(self, at: Duration) -> Vec<TimedPointerEvent> {
        let touch_events = std::iter::repeat(PointerEvent::TouchStart)
            .take(self.touches_started)
            .chain(std::iter::repeat(PointerEvent::TouchEnd).take(self.touches_ended));
        let mouse = [
            (self.mouse_pressed, PointerEvent::MouseDown),
            (self.mouse_released, PointerEvent::MouseUp),
        ]
        .into_iter()
        .filter_map(|(observed, event)| observed.then_some(event));

        touch_events
            .chain(mouse)
            .map(|event| TimedPointerEvent::new(event, at))
            .collect()
    }
}

/// Animated opacity of the peak marker.
///
/// Showing is instant. Hiding is instant unless the scene asks for a fade,
/// in which case the opacity ramps to zero over the fade duration.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerOpacity {
    opacity: f32,
    fade_ms: f64,
}

impl MarkerOpacity {
    /// Creates a transparent marker that fades over `fade_ms`.
    #[must_use]
    pub fn new(fade_ms: f64) -> Self {
        Self {
            opacity: 0.0,
            fade_ms,
        }
    }

    /// Advances the animation by `elapsed_ms` and returns the new opacity.
    pub fn advance(&mut self, hidden: bool, fading: bool, elapsed_ms: f64) -> f32 {
        self.opacity = if !hidden {
            1.0
        } else if fading && self.fade_ms > 0.0 {
            let step = (elapsed_ms / self.fade_ms) as f32;
            (self.opacity - step).max(0.0)
        } else {
            0.0
        };
        self.opacity
    }

    /// Current opacity in the range 0.0..=1.0.
    #[must_use]
    pub const fn opacity(&self) -> f32 {
        self.opacity
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug, Default)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs the frame rate once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }
}

/// Tracks the average frames-per-second produced by the render loop.
#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
}

impl FpsCounter {
    /// Records a rendered frame and returns the average rate once a second has elapsed.
    fn record_frame(&mut self, frame: Duration) -> Option<f32> {
        self.elapsed += frame;
        self.frames = self.frames.saturating_add(1);

        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let per_second = self.frames as f32 / self.elapsed.as_secs_f32();
        self.elapsed = Duration::ZERO;
        self.frames = 0;
        Some(per_second)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(FrameTime, &[TimedPointerEvent], &mut GaugeScene) + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            palette,
            dial,
            marker_fade_ms,
            scene,
        } = presentation;

        info!(title = %window_title, ?swap_interval, "opening gauge window");

        let mut config = macroquad::window::Conf {
            window_title,
            window_width: 480,
            window_height: 480,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let mut fps_counter = FpsCounter::default();
            let mut marker_opacity = MarkerOpacity::new(marker_fade_ms);

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    info!("quit requested");
                    break;
                }

                let dt_seconds = macroquad::time::get_frame_time();
                let frame = FrameTime::from_millis(f64::from(dt_seconds) * 1_000.0);
                let now = Duration::try_from_secs_f64(macroquad::time::get_time())
                    .unwrap_or_default();
                let pointer_events = PointerObservations::poll().into_events(now);

                update_scene(frame, &pointer_events, &mut scene);
                let opacity = marker_opacity.advance(
                    scene.marker_hidden,
                    scene.marker_fading,
                    frame.elapsed_ms(),
                );

                macroquad::window::clear_background(background);
                let metrics = DialMetrics::fit(
                    &dial,
                    macroquad::window::screen_width(),
                    macroquad::window::screen_height(),
                );
                draw_face(&metrics, &palette);
                draw_warn_arc(&dial, &metrics, &palette);
                draw_ticks(&dial, &metrics, &palette);
                draw_marker(&metrics, scene.marker, opacity, &palette);
                draw_needle(&metrics, scene.needle, &palette);

                let frame_duration = Duration::from_secs_f64(frame.elapsed_ms() / 1_000.0);
                let fps = fps_counter.record_frame(frame_duration);
                if show_fps {
                    if let Some(per_second) = fps {
                        info!(fps = per_second, "frame rate");
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_reports_once_per_second() {
        let mut counter = FpsCounter::default();
        let frame = Duration::from_millis(250);

        assert_eq!(counter.record_frame(frame), None);
        assert_eq!(counter.record_frame(frame), None);
        assert_eq!(counter.record_frame(frame), None);
        let fps = counter.record_frame(frame).expect("one second elapsed");
        assert!((fps - 4.0).abs() < 1e-4);
        assert_eq!(counter.record_frame(frame), None);
    }

    #[test]
    fn vsync_maps_to_swap_interval() {
        assert_eq!(MacroquadBackend::new().with_vsync(true).swap_interval, Some(1));
        assert_eq!(MacroquadBackend::new().with_vsync(false).swap_interval, Some(0));
        assert_eq!(MacroquadBackend::new().swap_interval, None);
    }

    #[test]
    fn colors_convert_channel_for_channel() {
        let converted = to_macroquad_color(Color::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(
            (converted.r, converted.g, converted.b, converted.a),
            (0.1, 0.2, 0.3, 0.4)
        );
    }

    #[test]
    fn marker_opacity_shows_instantly() {
        let mut opacity = MarkerOpacity::new(1_000.0);
        assert_eq!(opacity.advance(false, false, 16.0), 1.0);
    }
}
