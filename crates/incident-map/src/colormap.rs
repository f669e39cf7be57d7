//! Sequential color scale for incident counts
//!
//! A fixed 9-stop orange-red ramp, linearly interpolated between evenly
//! spaced breakpoints over the observed `[min, max]` count range.
//!
//! ```text
//! min ──┬──────┬──────┬── ... ──┬── max
//!    #fff7ec #fee8c8 #fdd49e  #7f0000
//! ```
//!
//! Every channel is non-increasing along the ramp, so a larger count never
//! maps to a lighter color.

use std::fmt;

/// 8-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Visual intensity in 0-1 (0 = white, 1 = black)
    pub fn intensity(&self) -> f64 {
        let sum = self.r as f64 + self.g as f64 + self.b as f64;
        1.0 - sum / (3.0 * 255.0)
    }

    /// Channel-wise linear interpolation, `t` in 0-1
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// ColorBrewer OrRd, 9 classes
pub const OR_RD_9: [Rgb; 9] = [
    Rgb::new(0xff, 0xf7, 0xec),
    Rgb::new(0xfe, 0xe8, 0xc8),
    Rgb::new(0xfd, 0xd4, 0x9e),
    Rgb::new(0xfd, 0xbb, 0x84),
    Rgb::new(0xfc, 0x8d, 0x59),
    Rgb::new(0xef, 0x65, 0x48),
    Rgb::new(0xd7, 0x30, 0x1f),
    Rgb::new(0xb3, 0x00, 0x00),
    Rgb::new(0x7f, 0x00, 0x00),
];

/// Monotonic `count → color` mapping over a fixed palette
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    min: f64,
    max: f64,
    palette: &'static [Rgb],
}

impl ColorScale {
    /// Scale over `[min, max]` with the OrRd ramp; swapped bounds are reordered
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            palette: &OR_RD_9,
        }
    }

    /// Scale calibrated to the observed range of `counts`; `None` when empty
    pub fn from_counts<I>(counts: I) -> Option<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut iter = counts.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));
        Some(Self::new(min as f64, max as f64))
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// All counts identical: every value maps to the lightest color
    pub fn is_degenerate(&self) -> bool {
        !(self.max > self.min)
    }

    /// Color for `value`; values outside the range clamp to the end colors
    pub fn color_for(&self, value: f64) -> Rgb {
        let last = self.palette.len() - 1;
        if self.is_degenerate() || value.is_nan() {
            return self.palette[0];
        }

        let t = ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        let position = t * last as f64;
        let index = position.floor() as usize;
        if index >= last {
            return self.palette[last];
        }
        self.palette[index].lerp(self.palette[index + 1], position - index as f64)
    }

    /// Color for an incident count
    pub fn color_for_count(&self, count: u64) -> Rgb {
        self.color_for(count as f64)
    }

    /// `(offset 0-1, color)` for every palette breakpoint
    pub fn gradient_stops(&self) -> Vec<(f64, Rgb)> {
        let last = (self.palette.len() - 1) as f64;
        self.palette
            .iter()
            .enumerate()
            .map(|(i, color)| (i as f64 / last, *color))
            .collect()
    }

    /// `n` evenly spaced values from min to max; a single value when degenerate
    pub fn ticks(&self, n: usize) -> Vec<f64> {
        if self.is_degenerate() || n < 2 {
            return vec![self.min];
        }
        let step = (self.max - self.min) / (n - 1) as f64;
        (0..n).map(|i| self.min + step * i as f64).collect()
    }
}
