//! Color util methods.
//!
//! HSV conversions follow Python's `colorsys` module: https://github.com/python/cpython/blob/3.12/Lib/colorsys.py

use derive_more::Constructor;
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// An opaque 8-bit RGB color value.
#[derive(Constructor, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Dark neutral tone used whenever a color can't be derived from a command.
    pub const FALLBACK: Rgb = Rgb {
        r: 0x18,
        g: 0x1B,
        b: 0x1C,
    };

    /// Convert hue (0..360 degrees), saturation (0..1) and value (0..1) to RGB.
    ///
    /// Out of range values are wrapped (hue) or clamped (saturation, value).
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Self {
        let h = (hue / 360.0).rem_euclid(1.0);
        let (r, g, b) = hsv_to_rgb(h, saturation.clamp(0.0, 1.0), value.clamp(0.0, 1.0));
        Rgb::new(to_u8(r), to_u8(g), to_u8(b))
    }

    /// Packed 0xAARRGGBB value with full opacity.
    pub fn argb(&self) -> u32 {
        0xFF00_0000 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Hue scaled 0-360, saturation and value scaled 0-1.
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let (h, s, v) = rgb_to_hsv(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        );
        (h * 360.0, s, v)
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Calculate an accent color which stands out on the given background color.
///
/// The hue is rotated to the complementary color. Saturation and value are pushed away from the
/// background: pale backgrounds get a saturated accent, dark backgrounds a bright one and vice
/// versa.
pub fn contrasting_color(background: Rgb) -> Rgb {
    let (h, s, v) = background.to_hsv();
    let hue = (h + 180.0) % 360.0;
    let saturation = if s < 0.5 { 0.95 } else { 0.75 };
    let value = if v < 0.5 { 0.95 } else { 0.25 };
    Rgb::from_hsv(hue, saturation, value)
}

fn to_u8(x: f32) -> u8 {
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}

// HSV: Hue, Saturation, Value
// H: position in the spectrum
// S: color saturation ("purity")
// V: color brightness

pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let rangec = maxc - minc;
    let v = maxc;

    if minc == maxc {
        return (0.0, 0.0, v);
    }
    let s = rangec / maxc;
    let rc = (maxc - r) / rangec;
    let gc = (maxc - g) / rangec;
    let bc = (maxc - b) / rangec;
    let mut h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    // Modulo operation: in Python the remainder will take the sign of the divisor, in Rust it will take the sign of the dividend
    // h = (h / 6.0) % 1.0;
    h = (h / 6.0).rem_euclid(1.0);
    (h, s, v)
}

/// All components are scaled 0-1.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (v, v, v);
    }
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match (i as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
