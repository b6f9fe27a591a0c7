//! Light state payload for bridge writes.

use serde::{Deserialize, Serialize};

use crate::types::{Alert, Brightness, Chromaticity, Color, Effect, Mired};

/// A state change to send to a light or group.
///
/// Payloads can combine several attributes (power, color, brightness...) that
/// the bridge applies in a single command.
///
/// # Creating Payloads
///
/// 1. **From a single attribute** using the [`From`] trait:
///    ```
///    use hue_bridge_rs::{Color, LightState};
///    let state = LightState::from(&Color::rgb(255, 0, 0));
///    assert!(state.is_valid());
///    ```
///
/// 2. **Builder pattern** for combining multiple attributes:
///    ```
///    use std::str::FromStr;
///    use hue_bridge_rs::{Brightness, Color, LightState};
///    let mut state = LightState::new();
///    state
///        .on(true)
///        .brightness(&Brightness::from_percent(80))
///        .color(&Color::from_str("#ff8000").unwrap());
///    let json = serde_json::to_value(&state).unwrap();
///    assert_eq!(json["on"], true);
///    assert_eq!(json["xy"].as_array().unwrap().len(), 2);
///    ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LightState {
    pub(crate) on: Option<bool>,
    pub(crate) bri: Option<u8>,
    pub(crate) xy: Option<[f64; 2]>,
    pub(crate) ct: Option<u16>,
    pub(crate) alert: Option<Alert>,
    pub(crate) effect: Option<Effect>,
    /// Deciseconds.
    #[serde(rename = "transitiontime")]
    pub(crate) transition_time: Option<u16>,
}

impl LightState {
    /// Create a new empty state.
    ///
    /// At least one attribute must be set for the state to be valid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this state changes anything.
    ///
    /// A transition time alone is not valid; it only shapes other changes.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::LightState;
    ///
    /// let mut state = LightState::new();
    /// state.transition_time(4);
    /// assert!(!state.is_valid());
    ///
    /// state.on(false);
    /// assert!(state.is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        self.on.is_some()
            || self.bri.is_some()
            || self.xy.is_some()
            || self.ct.is_some()
            || self.alert.is_some()
            || self.effect.is_some()
    }

    pub fn on(&mut self, on: bool) -> &mut Self {
        self.on = Some(on);
        self
    }

    pub fn brightness(&mut self, brightness: &Brightness) -> &mut Self {
        self.bri = Some(brightness.value);
        self
    }

    /// Set the color; it is sent as its xy chromaticity.
    pub fn color(&mut self, color: &Color) -> &mut Self {
        self.chromaticity(&color.to_chromaticity())
    }

    pub fn chromaticity(&mut self, xy: &Chromaticity) -> &mut Self {
        self.xy = Some(xy.to_array());
        self
    }

    pub fn color_temperature(&mut self, ct: &Mired) -> &mut Self {
        self.ct = Some(ct.value);
        self
    }

    pub fn alert(&mut self, alert: Alert) -> &mut Self {
        self.alert = Some(alert);
        self
    }

    pub fn effect(&mut self, effect: Effect) -> &mut Self {
        self.effect = Some(effect);
        self
    }

    pub fn transition_time(&mut self, deciseconds: u16) -> &mut Self {
        self.transition_time = Some(deciseconds);
        self
    }
}

impl From<&Color> for LightState {
    fn from(color: &Color) -> Self {
        let mut s = LightState::new();
        s.color(color);
        s
    }
}

impl From<&Brightness> for LightState {
    fn from(brightness: &Brightness) -> Self {
        let mut s = LightState::new();
        s.brightness(brightness);
        s
    }
}

impl From<&Mired> for LightState {
    fn from(ct: &Mired) -> Self {
        let mut s = LightState::new();
        s.color_temperature(ct);
        s
    }
}
