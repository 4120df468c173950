//! Power switch data point.

use serde::{Deserialize, Serialize};

/// Power state for a bulb (DP 20).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    /// Turn the bulb on
    On,
    /// Turn the bulb off
    Off,
}

impl PowerMode {
    pub fn is_on(&self) -> bool {
        matches!(self, PowerMode::On)
    }
}

impl From<bool> for PowerMode {
    fn from(on: bool) -> Self {
        if on { PowerMode::On } else { PowerMode::Off }
    }
}
