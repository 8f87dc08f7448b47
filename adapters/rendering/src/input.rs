use std::time::Duration;

use tachometer_core::Command;

/// Pointer input reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerEvent {
    /// Primary mouse button pressed.
    MouseDown,
    /// Primary mouse button released.
    MouseUp,
    /// A touch began.
    TouchStart,
    /// A touch ended or was cancelled.
    TouchEnd,
}

/// Pointer event stamped with the backend's monotonic clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedPointerEvent {
    /// Captured event.
    pub event: PointerEvent,
    /// Time since the backend started.
    pub at: Duration,
}

impl TimedPointerEvent {
    /// Stamps an event.
    #[must_use]
    pub const fn new(event: PointerEvent, at: Duration) -> Self {
        Self { event, at }
    }
}

/// Maps pointer input onto throttle commands.
///
/// Touch screens commonly synthesise mouse events right after a touch ends.
/// Mouse events arriving within the guard window of the last touch-end are
/// dropped so a single tap cannot open the throttle twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputAdapter {
    guard: Duration,
    last_touch_end: Option<Duration>,
}

impl InputAdapter {
    /// Window after a touch-end during which mouse events are ignored.
    pub const TOUCH_GUARD: Duration = Duration::from_millis(200);

    /// Creates an adapter using [`Self::TOUCH_GUARD`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_guard(Self::TOUCH_GUARD)
    }

    /// Creates an adapter with a custom guard window.
    #[must_use]
    pub const fn with_guard(guard: Duration) -> Self {
        Self {
            guard,
            last_touch_end: None,
        }
    }

    /// Translates one pointer event into the throttle command it requests.
    pub fn translate(&mut self, event: PointerEvent, at: Duration) -> Option<Command> {
        match event {
            PointerEvent::TouchStart => Some(Command::OpenThrottle),
            PointerEvent::TouchEnd => {
                self.last_touch_end = Some(at);
                Some(Command::CloseThrottle)
            }
            PointerEvent::MouseDown if !self.within_guard(at) => Some(Command::OpenThrottle),
            PointerEvent::MouseUp if !self.within_guard(at) => Some(Command::CloseThrottle),
            PointerEvent::MouseDown | PointerEvent::MouseUp => None,
        }
    }

    /// Translates a stamped event.
    pub fn translate_timed(&mut self, event: TimedPointerEvent) -> Option<Command> {
        self.translate(event.event, event.at)
    }

    fn within_guard(&self, at: Duration) -> bool {
        self.last_touch_end
            .map_or(false, |ended| at.saturating_sub(ended) < self.guard)
    }
}

impl Default for InputAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn mouse_maps_to_throttle_without_prior_touch() {
        let mut adapter = InputAdapter::new();
        assert_eq!(
            adapter.translate(PointerEvent::MouseDown, ms(0)),
            Some(Command::OpenThrottle)
        );
        assert_eq!(
            adapter.translate(PointerEvent::MouseUp, ms(5)),
            Some(Command::CloseThrottle)
        );
    }

    #[test]
    fn synthetic_mouse_after_touch_is_suppressed() {
        let mut adapter = InputAdapter::new();
        assert_eq!(
            adapter.translate(PointerEvent::TouchStart, ms(1_000)),
            Some(Command::OpenThrottle)
        );
        assert_eq!(
            adapter.translate(PointerEvent::TouchEnd, ms(1_100)),
            Some(Command::CloseThrottle)
        );

        assert_eq!(adapter.translate(PointerEvent::MouseDown, ms(1_120)), None);
        assert_eq!(adapter.translate(PointerEvent::MouseUp, ms(1_299)), None);
        assert_eq!(
            adapter.translate(PointerEvent::MouseDown, ms(1_300)),
            Some(Command::OpenThrottle)
        );
    }

    #[test]
    fn touch_is_never_guarded() {
        let mut adapter = InputAdapter::new();
        let _ = adapter.translate(PointerEvent::TouchEnd, ms(50));
        assert_eq!(
            adapter.translate(PointerEvent::TouchStart, ms(60)),
            Some(Command::OpenThrottle)
        );
    }

    #[test]
    fn out_of_order_stamp_stays_guarded() {
        let mut adapter = InputAdapter::new();
        let _ = adapter.translate_timed(TimedPointerEvent::new(PointerEvent::TouchEnd, ms(500)));
        assert_eq!(adapter.translate(PointerEvent::MouseDown, ms(400)), None);
    }
}
