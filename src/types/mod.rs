//! Value types for bulb data points.

mod brightness;
mod color_temp;
mod mode;
mod power;

pub use brightness::Brightness;
pub use color_temp::ColorTemp;
pub use mode::WorkMode;
pub use power::PowerMode;
