#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for tachometer adapters.
//!
//! Backends never read session state directly. Each frame the driving adapter
//! calls [`present`] with fresh snapshots, which pushes needle angles, warning
//! flags and marker visibility into a [`GaugeSurface`]. The retained
//! [`GaugeScene`] is the surface window backends draw from.

mod input;

use anyhow::Result as AnyResult;
use glam::Vec2;
use tachometer_core::{EngineSnapshot, FrameTime, MarkerPhase, MarkerSnapshot, Tuning};
use thiserror::Error;

pub use self::input::{InputAdapter, PointerEvent, TimedPointerEvent};

/// Needle angle, in degrees, at zero RPM.
pub const ZERO_RPM_ANGLE: f64 = -140.0;

/// Needle sweep, in degrees, per thousand RPM.
pub const DEGREES_PER_THOUSAND_RPM: f64 = 28.0;

/// Converts an engine speed into a needle rotation in degrees.
///
/// The result is rounded to three decimals with ties resolved towards
/// positive infinity, so equal speeds always land on identical angles.
#[must_use]
pub fn needle_angle(rpm: f64) -> f64 {
    let angle = ZERO_RPM_ANGLE + DEGREES_PER_THOUSAND_RPM * (rpm / 1_000.0);
    (angle * 1_000.0 + 0.5).floor() / 1_000.0
}

/// Reports whether an element showing `rpm` should be drawn in its warning state.
#[must_use]
pub fn should_warn(rpm: f64, tuning: &Tuning) -> bool {
    rpm >= tuning.warn_rpm
}

/// Point reached by a needle of `radius` rotated `angle_degrees` clockwise from
/// twelve o'clock around `center`, in screen space with y pointing down.
#[must_use]
pub fn needle_tip(center: Vec2, radius: f32, angle_degrees: f64) -> Vec2 {
    let radians = angle_degrees.to_radians() as f32;
    center + Vec2::new(radians.sin(), -radians.cos()) * radius
}

/// Gauge elements that carry their own rotation and warning state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GaugeElement {
    /// Needle tracking the live engine speed.
    Needle,
    /// Marker holding the last published peak.
    Marker,
}

/// Presentation surface a gauge frame is written to.
pub trait GaugeSurface {
    /// Rotates the element to the provided angle in degrees.
    fn set_needle_angle(&mut self, element: GaugeElement, degrees: f64);

    /// Toggles the warning visual of the element.
    fn set_warning(&mut self, element: GaugeElement, warning: bool);

    /// Updates marker visibility. `fading` is only meaningful while `hidden`.
    fn set_marker_visibility(&mut self, hidden: bool, fading: bool);
}

/// Writes one frame of gauge state into `surface`.
///
/// The needle follows the live RPM. The marker is repositioned only while it
/// shows a peak, so a marker that has just been hidden stays where it was
/// while it fades.
pub fn present<S>(engine: &EngineSnapshot, marker: &MarkerSnapshot, tuning: &Tuning, surface: &mut S)
where
    S: GaugeSurface + ?Sized,
{
    surface.set_needle_angle(GaugeElement::Needle, needle_angle(engine.rpm));
    surface.set_warning(GaugeElement::Needle, should_warn(engine.rpm, tuning));

    if marker.peak_rpm > 0.0 {
        surface.set_needle_angle(GaugeElement::Marker, needle_angle(marker.peak_rpm));
        surface.set_warning(GaugeElement::Marker, should_warn(marker.peak_rpm, tuning));
    }

    surface.set_marker_visibility(
        marker.phase != MarkerPhase::Visible,
        marker.phase == MarkerPhase::FadingOut,
    );
}

/// Rotation and warning state of a single gauge element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementState {
    /// Rotation in degrees, clockwise from twelve o'clock.
    pub angle_degrees: f64,
    /// Whether the element shows its warning visual.
    pub warning: bool,
}

impl ElementState {
    const RESTING: Self = Self {
        angle_degrees: ZERO_RPM_ANGLE,
        warning: false,
    };
}

/// Retained gauge state written by [`present`] and read by window backends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaugeScene {
    /// Live needle.
    pub needle: ElementState,
    /// Peak marker.
    pub marker: ElementState,
    /// Whether the marker is hidden.
    pub marker_hidden: bool,
    /// Whether hiding the marker should animate a fade.
    pub marker_fading: bool,
}

impl GaugeScene {
    /// Creates a scene with both elements resting at zero and the marker hidden.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            needle: ElementState::RESTING,
            marker: ElementState::RESTING,
            marker_hidden: true,
            marker_fading: false,
        }
    }

    fn element_mut(&mut self, element: GaugeElement) -> &mut ElementState {
        match element {
            GaugeElement::Needle => &mut self.needle,
            GaugeElement::Marker => &mut self.marker,
        }
    }
}

impl Default for GaugeScene {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeSurface for GaugeScene {
    fn set_needle_angle(&mut self, element: GaugeElement, degrees: f64) {
        self.element_mut(element).angle_degrees = degrees;
    }

    fn set_warning(&mut self, element: GaugeElement, warning: bool) {
        self.element_mut(element).warning = warning;
    }

    fn set_marker_visibility(&mut self, hidden: bool, fading: bool) {
        self.marker_hidden = hidden;
        self.marker_fading = fading;
    }
}

/// Tick mark drawn on the dial face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DialTick {
    /// Engine speed the tick marks.
    pub rpm: f64,
    /// Rotation of the tick in degrees.
    pub angle_degrees: f64,
    /// Label printed next to the tick, in thousands of RPM.
    pub label: u32,
    /// Whether the tick lies inside the warning band.
    pub warning: bool,
}

/// Geometry of the dial face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DialLayout {
    radius: f32,
    max_rpm: f64,
    warn_rpm: f64,
}

impl DialLayout {
    /// Dial radius used by the standard gauge, in pixels.
    pub const STANDARD_RADIUS: f32 = 180.0;

    /// Highest engine speed printed on the standard dial.
    pub const STANDARD_MAX_RPM: f64 = 8_000.0;

    /// Creates a dial layout after validating its geometry.
    pub fn new(radius: f32, max_rpm: f64, warn_rpm: f64) -> Result<Self, RenderingError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(RenderingError::InvalidRadius { radius });
        }
        if !(max_rpm.is_finite() && max_rpm >= 1_000.0) {
            return Err(RenderingError::InvalidRange { max_rpm });
        }
        if !(warn_rpm.is_finite() && warn_rpm > 0.0 && warn_rpm <= max_rpm) {
            return Err(RenderingError::WarnOutsideRange { warn_rpm, max_rpm });
        }

        Ok(Self {
            radius,
            max_rpm,
            warn_rpm,
        })
    }

    /// Standard 0 to 8000 RPM dial warning from the tuning's threshold.
    pub fn for_tuning(tuning: &Tuning) -> Result<Self, RenderingError> {
        Self::new(Self::STANDARD_RADIUS, Self::STANDARD_MAX_RPM, tuning.warn_rpm)
    }

    /// Radius of the dial face in pixels.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Highest engine speed printed on the dial.
    #[must_use]
    pub const fn max_rpm(&self) -> f64 {
        self.max_rpm
    }

    /// Major ticks, one per thousand RPM from zero to the dial maximum.
    pub fn major_ticks(&self) -> impl Iterator<Item = DialTick> + '_ {
        let count = (self.max_rpm / 1_000.0).floor() as u32;
        (0..=count).map(move |label| {
            let rpm = f64::from(label) * 1_000.0;
            DialTick {
                rpm,
                angle_degrees: needle_angle(rpm),
                label,
                warning: rpm >= self.warn_rpm,
            }
        })
    }

    /// Start and end angles of the warning band.
    #[must_use]
    pub fn warn_arc(&self) -> (f64, f64) {
        (needle_angle(self.warn_rpm), needle_angle(self.max_rpm))
    }
}

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns the color with its alpha scaled by `opacity`.
    #[must_use]
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            alpha: self.alpha * opacity.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Colors used to draw the gauge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    /// Dial face fill.
    pub face: Color,
    /// Tick marks and labels below the warning band.
    pub ticks: Color,
    /// Warning band, warning ticks and warning elements.
    pub warning: Color,
    /// Needle outside the warning band.
    pub needle: Color,
    /// Peak marker outside the warning band.
    pub marker: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            face: Color::from_rgb_u8(24, 24, 28),
            ticks: Color::from_rgb_u8(220, 220, 220),
            warning: Color::from_rgb_u8(230, 40, 40),
            needle: Color::from_rgb_u8(255, 160, 40),
            marker: Color::from_rgb_u8(120, 200, 255),
        }
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Gauge colors.
    pub palette: Palette,
    /// Dial geometry.
    pub dial: DialLayout,
    /// Milliseconds the marker takes to fade once hidden with a fade.
    pub marker_fade_ms: f64,
    /// Gauge state shown on the first frame.
    pub scene: GaugeScene,
}

impl Presentation {
    /// Constructs a new presentation descriptor with the default palette.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, dial: DialLayout, tuning: &Tuning) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            palette: Palette::default(),
            dial,
            marker_fade_ms: tuning.marker_fade_ms,
            scene: GaugeScene::new(),
        }
    }
}

/// Rendering backend capable of presenting the tachometer gauge.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta, the
    /// pointer events captured during the frame, and may mutate the scene
    /// before it is rendered.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(FrameTime, &[TimedPointerEvent], &mut GaugeScene) + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum RenderingError {
    /// The dial radius must be positive and finite.
    #[error("dial radius must be positive (received {radius})")]
    InvalidRadius {
        /// Provided radius that failed validation.
        radius: f32,
    },
    /// The dial must span at least one thousand RPM.
    #[error("dial range must cover at least 1000 rpm (received {max_rpm})")]
    InvalidRange {
        /// Provided maximum that failed validation.
        max_rpm: f64,
    },
    /// The warning threshold has to lie on the dial.
    #[error("warning threshold {warn_rpm} lies outside the dial range 0..={max_rpm}")]
    WarnOutsideRange {
        /// Provided warning threshold.
        warn_rpm: f64,
        /// Maximum of the dial.
        max_rpm: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tachometer_core::Timestamp;

    fn engine(rpm: f64) -> EngineSnapshot {
        EngineSnapshot {
            rpm,
            throttle_open: false,
            idling: false,
            fuel_cut: false,
            slowdown: 0.0,
        }
    }

    fn marker(phase: MarkerPhase, peak_rpm: f64) -> MarkerSnapshot {
        MarkerSnapshot {
            phase,
            peak_rpm,
            local_peak_rpm: 0.0,
            hold_deadline: None,
            fade_deadline: None,
        }
    }

    #[test]
    fn needle_angle_spans_dial() {
        assert_eq!(needle_angle(0.0), -140.0);
        assert_eq!(needle_angle(5_000.0), 0.0);
        assert_eq!(needle_angle(6_000.0), 28.0);
        assert_eq!(needle_angle(8_000.0), 84.0);
    }

    #[test]
    fn needle_angle_rounds_to_three_decimals() {
        let angle = needle_angle(1_234.56);
        assert!((angle - -105.432).abs() < 1e-9, "angle was {angle}");
        assert_eq!(needle_angle(1_234.56), needle_angle(1_234.56));
    }

    #[test]
    fn needle_angle_breaks_ties_towards_positive_infinity() {
        // Exactly -0.4375 and 3.0625 degrees before rounding.
        assert_eq!(needle_angle(4_984.375), -0.437);
        assert_eq!(needle_angle(5_109.375), 3.063);
    }

    #[test]
    fn warning_starts_at_threshold() {
        let tuning = Tuning::default();
        assert!(!should_warn(5_999.9, &tuning));
        assert!(should_warn(6_000.0, &tuning));
    }

    #[test]
    fn needle_tip_points_up_at_zero_degrees() {
        let tip = needle_tip(Vec2::new(100.0, 100.0), 50.0, 0.0);
        assert!((tip - Vec2::new(100.0, 50.0)).length() < 1e-4);

        let right = needle_tip(Vec2::ZERO, 10.0, 90.0);
        assert!((right - Vec2::new(10.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn present_writes_needle_and_visible_marker() {
        let tuning = Tuning::default();
        let mut scene = GaugeScene::new();

        present(
            &engine(6_500.0),
            &marker(MarkerPhase::Visible, 7_000.0),
            &tuning,
            &mut scene,
        );

        assert_eq!(scene.needle.angle_degrees, needle_angle(6_500.0));
        assert!(scene.needle.warning);
        assert_eq!(scene.marker.angle_degrees, needle_angle(7_000.0));
        assert!(scene.marker.warning);
        assert!(!scene.marker_hidden);
        assert!(!scene.marker_fading);
    }

    #[test]
    fn hidden_marker_keeps_last_position() {
        let tuning = Tuning::default();
        let mut scene = GaugeScene::new();
        present(
            &engine(3_000.0),
            &marker(MarkerPhase::Visible, 4_000.0),
            &tuning,
            &mut scene,
        );
        present(
            &engine(2_500.0),
            &marker(MarkerPhase::FadingOut, 4_000.0),
            &tuning,
            &mut scene,
        );
        assert!(scene.marker_hidden);
        assert!(scene.marker_fading);

        present(
            &engine(2_000.0),
            &marker(MarkerPhase::Hidden, 0.0),
            &tuning,
            &mut scene,
        );

        assert_eq!(scene.marker.angle_degrees, needle_angle(4_000.0));
        assert!(scene.marker_hidden);
        assert!(!scene.marker_fading);
        assert_eq!(scene.needle.angle_degrees, needle_angle(2_000.0));
    }

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<String>,
    }

    impl GaugeSurface for RecordingSurface {
        fn set_needle_angle(&mut self, element: GaugeElement, degrees: f64) {
            self.calls.push(format!("angle {element:?} {degrees}"));
        }

        fn set_warning(&mut self, element: GaugeElement, warning: bool) {
            self.calls.push(format!("warn {element:?} {warning}"));
        }

        fn set_marker_visibility(&mut self, hidden: bool, fading: bool) {
            self.calls.push(format!("marker hidden={hidden} fading={fading}"));
        }
    }

    #[test]
    fn present_through_trait_object_skips_empty_marker() {
        let mut surface = RecordingSurface::default();
        let dynamic: &mut dyn GaugeSurface = &mut surface;

        present(
            &engine(800.0),
            &MarkerSnapshot {
                phase: MarkerPhase::Hidden,
                peak_rpm: 0.0,
                local_peak_rpm: 1_200.0,
                hold_deadline: Some(Timestamp::ZERO),
                fade_deadline: None,
            },
            &Tuning::default(),
            dynamic,
        );

        assert_eq!(
            surface.calls,
            vec![
                "angle Needle -117.6".to_string(),
                "warn Needle false".to_string(),
                "marker hidden=true fading=false".to_string(),
            ]
        );
    }

    #[test]
    fn dial_layout_rejects_degenerate_geometry() {
        assert_eq!(
            DialLayout::new(0.0, 8_000.0, 6_000.0),
            Err(RenderingError::InvalidRadius { radius: 0.0 })
        );
        assert!(matches!(
            DialLayout::new(100.0, 500.0, 400.0),
            Err(RenderingError::InvalidRange { .. })
        ));
        assert!(matches!(
            DialLayout::new(100.0, 8_000.0, 9_000.0),
            Err(RenderingError::WarnOutsideRange { .. })
        ));
    }

    #[test]
    fn standard_dial_has_nine_labelled_ticks() {
        let dial = DialLayout::for_tuning(&Tuning::default()).expect("standard dial is valid");
        let ticks: Vec<DialTick> = dial.major_ticks().collect();

        assert_eq!(ticks.len(), 9);
        assert_eq!(ticks[0].label, 0);
        assert_eq!(ticks[8].angle_degrees, 84.0);
        assert_eq!(
            ticks.iter().filter(|tick| tick.warning).count(),
            3,
            "6000, 7000 and 8000 sit in the warning band"
        );
        assert_eq!(dial.warn_arc(), (28.0, 84.0));
    }

    #[test]
    fn opacity_scales_alpha() {
        let color = Color::new(1.0, 0.5, 0.25, 0.8).with_opacity(0.5);
        assert!((color.alpha - 0.4).abs() < 1e-6);
        assert_eq!(Color::new(1.0, 1.0, 1.0, 1.0).with_opacity(2.0).alpha, 1.0);
    }
}
