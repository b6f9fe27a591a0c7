//! Brightness control for bridge lights.

use serde::{Deserialize, Serialize};

/// Brightness on the bridge's `bri` scale, 1 (dimmest, still on) to 254.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    const MIN: u8 = 1;
    const MAX: u8 = 254;

    pub fn new() -> Self {
        Brightness { value: Self::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns None if value is outside valid range (1-254).
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Brightness;
    ///
    /// assert!(Brightness::create(0).is_none());
    /// assert!(Brightness::create(254).is_some());
    /// assert!(Brightness::create(255).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if Self::is_valid(value) {
            Some(Brightness { value })
        } else {
            None
        }
    }

    /// Scale a 0-100 percentage onto the bridge range.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Brightness;
    ///
    /// assert_eq!(Brightness::from_percent(100).value(), 254);
    /// assert_eq!(Brightness::from_percent(0).value(), 1);
    /// assert_eq!(Brightness::from_percent(50).value(), 127);
    /// ```
    pub fn from_percent(percent: u8) -> Self {
        let scaled = (u16::from(percent.min(100)) * u16::from(Self::MAX) + 50) / 100;
        Brightness {
            value: (scaled as u8).clamp(Self::MIN, Self::MAX),
        }
    }

    fn is_valid(value: u8) -> bool {
        (Self::MIN..=Self::MAX).contains(&value)
    }
}
