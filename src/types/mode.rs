//! Work mode data point.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Operating mode of the bulb (DP 21).
///
/// The ramp always drives bulbs in [`WorkMode::White`]; the other modes are
/// recognised so status queries can report them.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkMode {
    White,
    Colour,
    Scene,
    Music,
}

impl WorkMode {
    /// Look a mode up by its wire name.
    ///
    /// ```
    /// use tuya_sunrise_rs::WorkMode;
    ///
    /// assert_eq!(WorkMode::create("colour"), Some(WorkMode::Colour));
    /// assert_eq!(WorkMode::create("disco"), None);
    /// ```
    pub fn create(value: &str) -> Option<Self> {
        WorkMode::iter().find(|mode| mode.as_wire() == value)
    }

    pub fn as_wire(&self) -> &'static str {
        self.into()
    }
}
