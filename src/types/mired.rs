//! White color temperature in mired.

use serde::{Deserialize, Serialize};

/// Color temperature on the bridge's `ct` scale, in mired (1,000,000 / Kelvin).
///
/// The valid range, 153 to 500, spans roughly 6500K (cool daylight) down to
/// 2000K (warm candlelight).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Mired {
    pub(crate) value: u16,
}

impl Default for Mired {
    fn default() -> Self {
        Mired { value: Self::MIN }
    }
}

impl Mired {
    const MIN: u16 = 153;
    const MAX: u16 = 500;

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Returns `None` if value is outside the valid range (153-500).
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Mired;
    ///
    /// assert!(Mired::create(152).is_none());
    /// assert!(Mired::create(153).is_some());
    /// assert!(Mired::create(500).is_some());
    /// assert!(Mired::create(501).is_none());
    /// ```
    pub fn create(value: u16) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Mired { value })
        } else {
            None
        }
    }

    /// Convert from Kelvin, clamping to what the bridge accepts.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Mired;
    ///
    /// assert_eq!(Mired::from_kelvin(4000).value(), 250);
    /// assert_eq!(Mired::from_kelvin(10_000).value(), 153);
    /// assert_eq!(Mired::from_kelvin(0).value(), 500);
    /// ```
    pub fn from_kelvin(kelvin: u32) -> Self {
        let value = 1_000_000u32
            .checked_div(kelvin)
            .unwrap_or(u32::MAX)
            .clamp(u32::from(Self::MIN), u32::from(Self::MAX));
        Mired {
            value: value as u16,
        }
    }

    pub fn kelvin(&self) -> u32 {
        1_000_000 / u32::from(self.value)
    }
}
