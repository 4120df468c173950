//! Data point payload for Tuya white-spectrum bulbs.

use serde::{Deserialize, Serialize};

use crate::curve::CurvePoint;
use crate::types::{Brightness, ColorTemp, PowerMode, WorkMode};

/// A set of data points to send to a bulb in one command.
///
/// Only the keys that have been set are serialized, so a `Dps` can carry a
/// full state (power, mode, brightness, temperature) or a single change.
///
/// # Creating a Dps
///
/// 1. **From a single attribute** using the [`From`] trait:
///    ```
///    use tuya_sunrise_rs::{Dps, PowerMode};
///    let dps = Dps::from(&PowerMode::On);
///    ```
///
/// 2. **Builder pattern** for combining multiple attributes:
///    ```
///    use tuya_sunrise_rs::{Brightness, ColorTemp, Dps, WorkMode};
///    let mut dps = Dps::new();
///    dps.mode(WorkMode::White);
///    dps.brightness(&Brightness::create(400).unwrap());
///    dps.temperature(&ColorTemp::create(300).unwrap());
///    assert_eq!(
///        serde_json::to_string(&dps).unwrap(),
///        r#"{"21":"white","22":400,"23":300}"#
///    );
///    ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Dps {
    #[serde(rename = "20")]
    pub(crate) power: Option<bool>,
    #[serde(rename = "21")]
    pub(crate) mode: Option<WorkMode>,
    #[serde(rename = "22")]
    pub(crate) brightness: Option<u16>,
    #[serde(rename = "23")]
    pub(crate) temperature: Option<u16>,
}

impl Dps {
    /// Create a new empty data point set.
    ///
    /// At least one data point must be set for the set to be valid.
    ///
    /// ```
    /// use tuya_sunrise_rs::Dps;
    ///
    /// assert!(!Dps::new().is_valid());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Full white-mode state for a curve point: power on, white mode, values.
    ///
    /// Sending everything in one command keeps the bulb from briefly showing
    /// its previous state when it powers on.
    ///
    /// ```
    /// use tuya_sunrise_rs::{CurvePoint, Dps};
    ///
    /// let dps = Dps::white(&CurvePoint::new(0.0, 10, 0));
    /// assert_eq!(
    ///     serde_json::to_string(&dps).unwrap(),
    ///     r#"{"20":true,"21":"white","22":10,"23":0}"#
    /// );
    /// ```
    pub fn white(point: &CurvePoint) -> Self {
        let mut dps = Self::levels(point);
        dps.power(&PowerMode::On);
        dps.mode(WorkMode::White);
        dps
    }

    /// Brightness and temperature only, for a bulb already in white mode.
    pub fn levels(point: &CurvePoint) -> Self {
        let mut dps = Dps::new();
        dps.brightness(&Brightness::clamped(point.brightness));
        dps.temperature(&ColorTemp::clamped(point.color_temp));
        dps
    }

    pub fn is_valid(&self) -> bool {
        self.power.is_some()
            || self.mode.is_some()
            || self.brightness.is_some()
            || self.temperature.is_some()
    }

    pub fn power(&mut self, power: &PowerMode) {
        self.power = Some(power.is_on());
    }

    pub fn mode(&mut self, mode: WorkMode) {
        self.mode = Some(mode);
    }

    pub fn brightness(&mut self, brightness: &Brightness) {
        self.brightness = Some(brightness.value);
    }

    pub fn temperature(&mut self, temperature: &ColorTemp) {
        self.temperature = Some(temperature.value);
    }

    pub fn get_power(&self) -> Option<PowerMode> {
        self.power.map(PowerMode::from)
    }

    pub fn get_mode(&self) -> Option<WorkMode> {
        self.mode
    }

    pub fn get_brightness(&self) -> Option<Brightness> {
        self.brightness.and_then(Brightness::create)
    }

    pub fn get_temperature(&self) -> Option<ColorTemp> {
        self.temperature.and_then(ColorTemp::create)
    }
}

impl From<&PowerMode> for Dps {
    fn from(power: &PowerMode) -> Self {
        let mut dps = Dps::new();
        dps.power(power);
        dps
    }
}

impl From<&Brightness> for Dps {
    fn from(brightness: &Brightness) -> Self {
        let mut dps = Dps::new();
        dps.brightness(brightness);
        dps
    }
}

impl From<&ColorTemp> for Dps {
    fn from(temperature: &ColorTemp) -> Self {
        let mut dps = Dps::new();
        dps.temperature(temperature);
        dps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_clamp_to_device_range() {
        let dps = Dps::levels(&CurvePoint::new(0.5, 5, 1200));
        assert_eq!(dps.brightness, Some(10));
        assert_eq!(dps.temperature, Some(1000));
        assert!(dps.power.is_none());
    }

    #[test]
    fn test_power_off_serializes_false() {
        let dps = Dps::from(&PowerMode::Off);
        assert_eq!(serde_json::to_string(&dps).unwrap(), r#"{"20":false}"#);
    }

    #[test]
    fn test_parse_status_dps_ignores_unknown_keys() {
        let dps: Dps =
            serde_json::from_str(r#"{"20":true,"21":"colour","22":500,"24":"000003e803e8"}"#)
                .unwrap();
        assert_eq!(dps.get_power(), Some(PowerMode::On));
        assert_eq!(dps.get_mode(), Some(WorkMode::Colour));
        assert_eq!(dps.get_brightness().unwrap().value(), 500);
        assert!(dps.get_temperature().is_none());
    }
}
