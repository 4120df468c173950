//! Color temperature data point.

use serde::{Deserialize, Serialize};

/// White color temperature in the device-native 0-1000 scale (DP 23).
///
/// 0 is the warmest white the bulb can produce and 1000 the coolest; the
/// Kelvin values behind the scale depend on the bulb model.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ColorTemp {
    pub(crate) value: u16,
}

impl ColorTemp {
    pub const MIN: u16 = 0;
    pub const MAX: u16 = 1000;

    /// Create a new ColorTemp at the warmest setting.
    ///
    /// # Examples
    ///
    /// ```
    /// use tuya_sunrise_rs::ColorTemp;
    ///
    /// assert_eq!(ColorTemp::new().value(), 0);
    /// ```
    pub fn new() -> Self {
        ColorTemp { value: Self::MIN }
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Create a new ColorTemp with the given value.
    ///
    /// Returns `None` if value is outside the valid range (0-1000).
    ///
    /// # Examples
    ///
    /// ```
    /// use tuya_sunrise_rs::ColorTemp;
    ///
    /// assert!(ColorTemp::create(0).is_some());
    /// assert!(ColorTemp::create(1000).is_some());
    /// assert!(ColorTemp::create(1001).is_none());
    /// ```
    pub fn create(value: u16) -> Option<Self> {
        if Self::is_valid(value) {
            Some(ColorTemp { value })
        } else {
            None
        }
    }

    pub fn clamped(value: u16) -> Self {
        ColorTemp {
            value: value.min(Self::MAX),
        }
    }

    pub(crate) fn is_valid(value: u16) -> bool {
        value <= Self::MAX
    }
}
