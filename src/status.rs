//! Bulb status as reported by a data point query.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dps::Dps;
use crate::errors::Error;
use crate::types::{Brightness, ColorTemp, PowerMode, WorkMode};

type Result<T> = std::result::Result<T, Error>;

/// Current state of a bulb.
///
/// The white-spectrum data points are decoded; everything else the bulb
/// reports is kept untouched in [`DeviceStatus::raw`].
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceStatus {
    power: Option<PowerMode>,
    mode: Option<WorkMode>,
    brightness: Option<Brightness>,
    temperature: Option<ColorTemp>,
    raw: Map<String, Value>,
}

impl DeviceStatus {
    /// Parse the payload of a query response (`{"devId": ..., "dps": {...}}`).
    ///
    /// ```
    /// use serde_json::json;
    /// use tuya_sunrise_rs::{DeviceStatus, PowerMode, WorkMode};
    ///
    /// let status = DeviceStatus::from_payload(&json!({
    ///     "devId": "bf00",
    ///     "dps": {"20": true, "21": "white", "22": 640, "23": 120, "26": 0}
    /// })).unwrap();
    /// assert_eq!(status.power(), Some(PowerMode::On));
    /// assert_eq!(status.mode(), Some(WorkMode::White));
    /// assert_eq!(status.brightness().unwrap().value(), 640);
    /// assert_eq!(status.temperature().unwrap().value(), 120);
    /// assert_eq!(status.raw().len(), 5);
    /// ```
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let raw = payload
            .get("dps")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| Error::PayloadDecode("status payload has no dps object".into()))?;

        // Decode what we understand field by field so one odd value
        // (e.g. a scene-mode string) does not hide the others
        let pick = |key: &str| {
            raw.get(key)
                .cloned()
                .map(|v| Value::Object(Map::from_iter([(key.to_string(), v)])))
                .and_then(|v| serde_json::from_value::<Dps>(v).ok())
        };

        Ok(DeviceStatus {
            power: pick("20").and_then(|d| d.get_power()),
            mode: pick("21").and_then(|d| d.get_mode()),
            brightness: pick("22").and_then(|d| d.get_brightness()),
            temperature: pick("23").and_then(|d| d.get_temperature()),
            raw,
        })
    }

    pub fn power(&self) -> Option<PowerMode> {
        self.power
    }

    /// Check if the bulb is switched on.
    pub fn emitting(&self) -> bool {
        self.power.is_some_and(|p| p.is_on())
    }

    pub fn mode(&self) -> Option<WorkMode> {
        self.mode
    }

    pub fn brightness(&self) -> Option<Brightness> {
        self.brightness
    }

    pub fn temperature(&self) -> Option<ColorTemp> {
        self.temperature
    }

    /// Every data point the bulb reported, keyed by DP id.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }
}

/// Result of probing a bulb.
#[derive(Debug, Clone)]
pub enum DeviceReport {
    Reachable(DeviceStatus),
    Unreachable(String),
}

impl DeviceReport {
    pub fn is_reachable(&self) -> bool {
        matches!(self, DeviceReport::Reachable(_))
    }

    pub fn status(&self) -> Option<&DeviceStatus> {
        match self {
            DeviceReport::Reachable(status) => Some(status),
            DeviceReport::Unreachable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_dps_is_error() {
        assert!(DeviceStatus::from_payload(&json!({"devId": "x"})).is_err());
    }

    #[test]
    fn test_unexpected_values_are_skipped() {
        let status = DeviceStatus::from_payload(&json!({
            "dps": {"20": false, "21": "scene_4", "22": 5000}
        }))
        .unwrap();
        assert_eq!(status.power(), Some(PowerMode::Off));
        assert!(!status.emitting());
        assert!(status.mode().is_none());
        // Out of range for this bulb class
        assert!(status.brightness().is_none());
        assert!(status.temperature().is_none());
        assert_eq!(status.raw()["21"], json!("scene_4"));
    }
}
