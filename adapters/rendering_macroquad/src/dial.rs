//! Immediate-mode drawing of the gauge.

use glam::Vec2;
use macroquad::{
    shapes::{draw_circle, draw_circle_lines, draw_line},
    text::{draw_text, measure_text},
};
use tachometer_rendering::{needle_angle, needle_tip, DialLayout, ElementState, Palette};

use super::to_macroquad_color;

const LABEL_FONT_SIZE: f32 = 28.0;
const WARN_ARC_STEP_DEGREES: f64 = 2.0;

/// Screen-space placement of the dial for the current window size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DialMetrics {
    pub(crate) center: Vec2,
    pub(crate) radius: f32,
    pub(crate) scale: f32,
}

impl DialMetrics {
    /// Centres the dial and shrinks it to fit the smaller screen dimension.
    pub(crate) fn fit(dial: &DialLayout, screen_width: f32, screen_height: f32) -> Self {
        let available = (screen_width.min(screen_height) * 0.45).max(1.0);
        let radius = dial.radius().min(available);

        Self {
            center: Vec2::new(screen_width * 0.5, screen_height * 0.5),
            radius,
            scale: radius / dial.radius(),
        }
    }

    fn at(&self, fraction: f32, angle_degrees: f64) -> Vec2 {
        needle_tip(self.center, self.radius * fraction, angle_degrees)
    }
}

fn line(from: Vec2, to: Vec2, thickness: f32, color: macroquad::color::Color) {
    draw_line(from.x, from.y, to.x, to.y, thickness, color);
}

pub(crate) fn draw_face(metrics: &DialMetrics, palette: &Palette) {
    let center = metrics.center;
    draw_circle(
        center.x,
        center.y,
        metrics.radius,
        to_macroquad_color(palette.face),
    );
    draw_circle_lines(
        center.x,
        center.y,
        metrics.radius,
        3.0 * metrics.scale,
        to_macroquad_color(palette.ticks),
    );
}

pub(crate) fn draw_warn_arc(dial: &DialLayout, metrics: &DialMetrics, palette: &Palette) {
    let (start, end) = dial.warn_arc();
    let color = to_macroquad_color(palette.warning);
    let thickness = 10.0 * metrics.scale;

    let mut from = start;
    while from < end {
        let to = (from + WARN_ARC_STEP_DEGREES).min(end);
        line(metrics.at(0.9, from), metrics.at(0.9, to), thickness, color);
        from = to;
    }
}

pub(crate) fn draw_ticks(dial: &DialLayout, metrics: &DialMetrics, palette: &Palette) {
    for tick in dial.major_ticks() {
        let color = if tick.warning {
            palette.warning
        } else {
            palette.ticks
        };
        let color = to_macroquad_color(color);

        line(
            metrics.at(0.8, tick.angle_degrees),
            metrics.at(0.97, tick.angle_degrees),
            4.0 * metrics.scale,
            color,
        );

        let half_step = tick.rpm + 500.0;
        if half_step <= dial.max_rpm() {
            let angle = needle_angle(half_step);
            line(
                metrics.at(0.88, angle),
                metrics.at(0.97, angle),
                2.0 * metrics.scale,
                color,
            );
        }

        let label = tick.label.to_string();
        let font_size = (LABEL_FONT_SIZE * metrics.scale).max(8.0);
        let size = measure_text(&label, None, font_size as u16, 1.0);
        let anchor = metrics.at(0.66, tick.angle_degrees);
        let _ = draw_text(
            &label,
            anchor.x - size.width * 0.5,
            anchor.y + size.height * 0.5,
            font_size,
            color,
        );
    }
}

pub(crate) fn draw_marker(
    metrics: &DialMetrics,
    marker: ElementState,
    opacity: f32,
    palette: &Palette,
) {
    if opacity <= 0.0 {
        return;
    }

    let base = if marker.warning {
        palette.warning
    } else {
        palette.marker
    };
    line(
        metrics.at(0.74, marker.angle_degrees),
        metrics.at(0.99, marker.angle_degrees),
        6.0 * metrics.scale,
        to_macroquad_color(base.with_opacity(opacity)),
    );
}

pub(crate) fn draw_needle(metrics: &DialMetrics, needle: ElementState, palette: &Palette) {
    let color = if needle.warning {
        palette.warning
    } else {
        palette.needle
    };
    let color = to_macroquad_color(color);

    let tip = metrics.at(0.86, needle.angle_degrees);
    let tail = metrics.at(0.18, needle.angle_degrees + 180.0);
    line(tail, tip, 5.0 * metrics.scale, color);
    draw_circle(
        metrics.center.x,
        metrics.center.y,
        12.0 * metrics.scale,
        color,
    );
}
