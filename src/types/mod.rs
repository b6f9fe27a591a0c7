//! Value types for light state parameters.

mod alert;
mod brightness;
mod color;
mod mired;

pub use alert::{Alert, Effect};
pub use brightness::Brightness;
pub use color::{Chromaticity, Color, hex_to_chromaticity, rgb_to_chromaticity};
pub use mired::Mired;
