//! Linear rescaling of raw intensities into 8-bit gray levels.
//!
//! The range used for the rescale is chosen by a [`NormalizationPolicy`]:
//!
//! - `Volume` (default): minimum and maximum over the whole intensity volume of a subject.
//!   Every slice of a subject shares one mapping, while brightness is not comparable
//!   between subjects with different intensity ranges.
//! - `Slice`: minimum and maximum of each slice. Every slice spans the full gray range.
//! - `Fixed`: a caller supplied window shared by all subjects. Intensities outside the
//!   window are clamped, and gray levels are comparable across the whole dataset.
//!
//! Non-finite intensities are ignored when computing a range and are written as 0.
use ndarray::{Array2, Array3};
use std::fmt;

pub const MAX_GRAY: f32 = u8::MAX as f32;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DisplayNormalization {
    #[default]
    Volume,
    Slice,
    Fixed,
}

impl fmt::Display for DisplayNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policy_str = match self {
            DisplayNormalization::Volume => "volume",
            DisplayNormalization::Slice => "slice",
            DisplayNormalization::Fixed => "fixed",
        };
        write!(f, "{policy_str}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NormalizationPolicy {
    #[default]
    Volume,
    Slice,
    Fixed(IntensityWindow),
}

impl NormalizationPolicy {
    /// Window shared by every slice of `volume`, or `None` when each slice computes its own.
    pub fn resolve(&self, volume: &Array3<f32>) -> Option<IntensityWindow> {
        match self {
            NormalizationPolicy::Volume => Some(IntensityWindow::from_values(volume.iter())),
            NormalizationPolicy::Slice => None,
            NormalizationPolicy::Fixed(window) => Some(*window),
        }
    }

    /// Window for one slice, given the result of [`NormalizationPolicy::resolve`].
    pub fn window_for(
        &self,
        resolved: Option<IntensityWindow>,
        slice: &Array2<f32>,
    ) -> IntensityWindow {
        resolved.unwrap_or_else(|| IntensityWindow::from_values(slice.iter()))
    }
}

impl fmt::Display for NormalizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationPolicy::Volume => write!(f, "volume"),
            NormalizationPolicy::Slice => write!(f, "slice"),
            NormalizationPolicy::Fixed(window) => {
                write!(f, "fixed [{}, {}]", window.min, window.max)
            }
        }
    }
}

/// Closed intensity interval mapped onto `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntensityWindow {
    pub min: f32,
    pub max: f32,
}

impl IntensityWindow {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Smallest window holding every finite value. Empty input gives the degenerate window at 0.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a f32>) -> Self {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Self>, &v| match acc {
                Some(w) => Some(Self::new(w.min.min(v), w.max.max(v))),
                None => Some(Self::new(v, v)),
            })
            .unwrap_or_default()
    }

    pub fn width(&self) -> f32 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0)
    }

    /// Map an intensity to a gray level. Monotonic non-decreasing in `value`.
    pub fn eval(&self, value: f32) -> u8 {
        if !value.is_finite() || self.is_degenerate() {
            return 0;
        }
        let scaled = (value.clamp(self.min, self.max) - self.min) / self.width() * MAX_GRAY;
        scaled.round().clamp(0.0, MAX_GRAY) as u8
    }

    /// Approximate intensity of a gray level. Accurate to half a gray step.
    pub fn invert(&self, gray: u8) -> f32 {
        self.min + gray as f32 / MAX_GRAY * self.width()
    }
}

/// Rescale a raw intensity slice to 8-bit using `window`.
pub fn normalize_intensity(slice: &Array2<f32>, window: &IntensityWindow) -> Array2<u8> {
    slice.mapv(|v| window.eval(v))
}
