use std::fmt;

/// Maps normalised positions to the derived value `t`.
pub type DeriveFn = Box<dyn Fn(f64) -> f64>;

/// Snapshot of the playhead handed to the draw callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePosition {
    pub u: f64,
    pub t: Option<f64>,
}

/// Numeric range of the external scrub control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubRange {
    pub min: f64,
    pub max: f64,
}

impl ScrubRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn span(&self) -> f64 {
        self.max - self.min
    }
}

impl Default for ScrubRange {
    fn default() -> Self {
        Self::new(0.0, 1000.0)
    }
}

/// Normalised position shared by the playback and export drivers.
///
/// `u` always stays within `[0, 1]`: writes are clamped, never rejected.
pub struct Playhead {
    u: f64,
    derive_t: Option<DeriveFn>,
    range: ScrubRange,
}

impl Playhead {
    pub fn new() -> Self {
        Self {
            u: 0.0,
            derive_t: None,
            range: ScrubRange::default(),
        }
    }

    /// Creates a playhead whose derived value is `derive_t(u)`.
    pub fn with_derived(derive_t: impl Fn(f64) -> f64 + 'static) -> Self {
        Self {
            derive_t: Some(Box::new(derive_t)),
            ..Self::new()
        }
    }

    pub fn with_range(mut self, range: ScrubRange) -> Self {
        self.range = range;
        self
    }

    pub fn get(&self) -> f64 {
        self.u
    }

    pub fn set(&mut self, value: f64) {
        self.u = clamp_unit(value);
    }

    /// Evaluates the derive function against the current position. Never
    /// cached.
    pub fn derived(&self) -> Option<f64> {
        self.derive_t.as_ref().map(|derive| derive(self.u))
    }

    pub fn position(&self) -> FramePosition {
        FramePosition {
            u: self.u,
            t: self.derived(),
        }
    }

    pub fn range(&self) -> ScrubRange {
        self.range
    }

    /// Position expressed in the scrub control's units.
    pub fn control_value(&self) -> f64 {
        self.range.min + self.u * self.range.span()
    }

    /// Applies a raw value read from the scrub control.
    pub fn set_from_control(&mut self, value: f64) {
        let span = self.range.span();
        if span == 0.0 {
            self.set(0.0);
        } else {
            self.set((value - self.range.min) / span);
        }
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Playhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playhead")
            .field("u", &self.u)
            .field("derived", &self.derive_t.is_some())
            .field("range", &self.range)
            .finish()
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn writes_are_clamped() {
        let mut playhead = Playhead::new();
        playhead.set(1.7);
        assert_eq!(playhead.get(), 1.0);
        playhead.set(-0.2);
        assert_eq!(playhead.get(), 0.0);
        playhead.set(f64::NAN);
        assert_eq!(playhead.get(), 0.0);
        playhead.set(0.25);
        assert_eq!(playhead.get(), 0.25);
    }

    #[test]
    fn derived_value_is_evaluated_on_every_access() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut playhead = Playhead::with_derived(move |u| {
            counter.set(counter.get() + 1);
            u * u
        });

        playhead.set(0.5);
        assert_eq!(playhead.derived(), Some(0.25));
        assert_eq!(playhead.derived(), Some(0.25));
        assert_eq!(calls.get(), 2);

        playhead.set(1.0);
        assert_eq!(playhead.position(), FramePosition { u: 1.0, t: Some(1.0) });
    }

    #[test]
    fn derived_value_is_absent_without_function() {
        let playhead = Playhead::new();
        assert_eq!(playhead.derived(), None);
        assert_eq!(playhead.position().t, None);
    }

    #[test]
    fn control_values_map_through_range() {
        let mut playhead = Playhead::new().with_range(ScrubRange::new(10.0, 20.0));
        playhead.set_from_control(15.0);
        assert_eq!(playhead.get(), 0.5);
        assert_eq!(playhead.control_value(), 15.0);

        playhead.set_from_control(42.0);
        assert_eq!(playhead.get(), 1.0);
        assert_eq!(playhead.control_value(), 20.0);
    }

    proptest! {
        #[test]
        fn set_then_get_returns_clamped_value(v in proptest::num::f64::ANY) {
            let mut playhead = Playhead::new();
            playhead.set(v);
            let expected = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
            prop_assert_eq!(playhead.get(), expected);
        }
    }
}
