//! RGB colors and their conversion to CIE xy chromaticity.
//!
//! Bridges address color as a point in the CIE 1931 xy plane. Converting from
//! 8-bit sRGB goes: normalize, undo the sRGB transfer curve, project through
//! the sRGB → XYZ matrix, then normalize `X` and `Y` by `X + Y + Z`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::Error;

/// sRGB (D65) to CIE XYZ, rows X, Y, Z.
const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124, 0.3576, 0.1805],
    [0.2126, 0.7152, 0.0722],
    [0.0193, 0.1192, 0.9505],
];

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub(crate) red: u8,
    pub(crate) green: u8,
    pub(crate) blue: u8,
}

impl Color {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Create a default color (black: 0,0,0).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    /// Parse `#RRGGBB` or `#RGB` (the `#` is optional, case is ignored).
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Color;
    ///
    /// assert_eq!(Color::from_hex("#ff8000").unwrap(), Color::rgb(255, 128, 0));
    /// assert_eq!(Color::from_hex("f80").unwrap(), Color::rgb(255, 136, 0));
    /// assert!(Color::from_hex("#12345").is_err());
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidColorString(hex.to_string()));
        }

        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(Error::InvalidColorString(hex.to_string())),
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| Error::InvalidColorString(hex.to_string()))
        };
        Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    /// The bridge-native chromaticity of this color.
    pub fn to_chromaticity(&self) -> Chromaticity {
        rgb_to_chromaticity(self.red, self.green, self.blue)
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parse from a hex string (`#ff8000`, `#f80`) or a comma-separated
    /// triple (`255,128,0`).
    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        if !s.contains(',') {
            return Self::from_hex(s);
        }

        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidColorString(s.to_string()))?;
        match parts.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            _ => Err(Error::InvalidColorString(s.to_string())),
        }
    }
}

/// A CIE 1931 xy chromaticity coordinate, brightness independent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

impl Chromaticity {
    /// D65 white point, returned for inputs with no luminous energy.
    pub const WHITE_POINT: Chromaticity = Chromaticity {
        x: 0.3127,
        y: 0.3290,
    };

    pub fn new(x: f64, y: f64) -> Self {
        Chromaticity { x, y }
    }

    /// The `[x, y]` pair as the bridge expects it in a light state.
    pub fn to_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Convert an 8-bit sRGB triple to xy chromaticity.
///
/// Pure black has no chromaticity (`X + Y + Z == 0`), so it maps to
/// [`Chromaticity::WHITE_POINT`].
///
/// # Examples
///
/// ```
/// use hue_bridge_rs::{Chromaticity, rgb_to_chromaticity};
///
/// assert_eq!(rgb_to_chromaticity(0, 0, 0), Chromaticity::WHITE_POINT);
///
/// let red = rgb_to_chromaticity(255, 0, 0);
/// assert!((red.x - 0.6401).abs() < 1e-3);
/// assert!((red.y - 0.3300).abs() < 1e-3);
/// ```
pub fn rgb_to_chromaticity(red: u8, green: u8, blue: u8) -> Chromaticity {
    let linear = [red, green, blue].map(|c| gamma_expand(f64::from(c) / 255.0));
    let [x, y, z] = SRGB_TO_XYZ.map(|row| {
        row.iter()
            .zip(linear.iter())
            .map(|(coef, channel)| coef * channel)
            .sum::<f64>()
    });

    let sum = x + y + z;
    if sum == 0.0 {
        return Chromaticity::WHITE_POINT;
    }
    Chromaticity::new(x / sum, y / sum)
}

/// Convert a `#RRGGBB` or `#RGB` string to xy chromaticity.
pub fn hex_to_chromaticity(hex: &str) -> Result<Chromaticity, Error> {
    Color::from_hex(hex).map(|c| c.to_chromaticity())
}

/// Inverse sRGB transfer function.
fn gamma_expand(v: f64) -> f64 {
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Chromaticity, x: f64, y: f64) {
        assert!(
            (actual.x - x).abs() < 1e-3 && (actual.y - y).abs() < 1e-3,
            "expected ({x}, {y}), got {actual:?}"
        );
    }

    #[test]
    fn test_black_falls_back_to_white_point() {
        let xy = rgb_to_chromaticity(0, 0, 0);
        assert_eq!(xy.x, 0.3127);
        assert_eq!(xy.y, 0.3290);
    }

    #[test]
    fn test_primaries_and_white() {
        assert_close(rgb_to_chromaticity(255, 0, 0), 0.6401, 0.3300);
        assert_close(rgb_to_chromaticity(0, 255, 0), 0.3000, 0.6000);
        assert_close(rgb_to_chromaticity(0, 0, 255), 0.1500, 0.0600);
        assert_close(rgb_to_chromaticity(255, 255, 255), 0.3127, 0.3290);
    }

    #[test]
    fn test_coordinates_stay_in_unit_range() {
        for r in (0..=255u8).step_by(15) {
            for g in (0..=255u8).step_by(15) {
                for b in (0..=255u8).step_by(15) {
                    let xy = rgb_to_chromaticity(r, g, b);
                    assert!((0.0..=1.0).contains(&xy.x), "x out of range for {r},{g},{b}");
                    assert!((0.0..=1.0).contains(&xy.y), "y out of range for {r},{g},{b}");
                }
            }
        }
    }

    #[test]
    fn test_short_hex_matches_long_hex() {
        assert_eq!(
            hex_to_chromaticity("#FF0000").unwrap(),
            hex_to_chromaticity("#f00").unwrap()
        );
        assert_eq!(
            hex_to_chromaticity("#FF0000").unwrap(),
            rgb_to_chromaticity(255, 0, 0)
        );
    }

    #[test]
    fn test_gamma_segments() {
        assert_eq!(gamma_expand(0.0), 0.0);
        assert!((gamma_expand(0.04045) - 0.04045 / 12.92).abs() < 1e-12);
        assert!((gamma_expand(1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_color_strings() {
        assert_eq!(Color::from_str("255,128,0").unwrap(), Color::rgb(255, 128, 0));
        assert_eq!(Color::from_str(" #00FF00 ").unwrap(), Color::rgb(0, 255, 0));
        assert_eq!(
            Color::from_str("256,0,0").unwrap_err(),
            Error::InvalidColorString("256,0,0".into())
        );
        assert!(Color::from_str("1,2").is_err());
        assert!(Color::from_str("#gg0000").is_err());
        assert!(Color::from_str("").is_err());
    }
}
