//! Alert and dynamic effect modes.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// A temporary change in a light's state used to draw attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Alert {
    /// Stop any running alert.
    None,
    /// A single breathe cycle.
    Select,
    /// Breathe cycles for 15 seconds.
    LSelect,
}

/// A continuous dynamic effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Effect {
    None,
    /// Cycle through all hues at the current brightness and saturation.
    ColorLoop,
}
