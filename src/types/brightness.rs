//! Brightness data point.

use serde::{Deserialize, Serialize};

/// Brightness in the device-native 10-1000 scale (DP 22).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Brightness {
    pub(crate) value: u16,
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new()
    }
}

impl Brightness {
    pub const MIN: u16 = 10;
    pub const MAX: u16 = 1000;

    pub fn new() -> Self {
        Brightness { value: Self::MAX }
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Returns None if value is outside valid range (10-1000).
    ///
    /// ```
    /// use tuya_sunrise_rs::Brightness;
    ///
    /// assert!(Brightness::create(9).is_none());
    /// assert_eq!(Brightness::create(10).unwrap().value(), 10);
    /// assert!(Brightness::create(1001).is_none());
    /// ```
    pub fn create(value: u16) -> Option<Self> {
        if Self::is_valid(value) {
            Some(Brightness { value })
        } else {
            None
        }
    }

    /// Clamps into the valid range, as bulbs reject out-of-range values.
    ///
    /// ```
    /// use tuya_sunrise_rs::Brightness;
    ///
    /// assert_eq!(Brightness::clamped(0).value(), 10);
    /// assert_eq!(Brightness::clamped(5000).value(), 1000);
    /// ```
    pub fn clamped(value: u16) -> Self {
        Brightness {
            value: value.clamp(Self::MIN, Self::MAX),
        }
    }

    pub(crate) fn is_valid(value: u16) -> bool {
        (Self::MIN..=Self::MAX).contains(&value)
    }
}
