//! # tuya_sunrise_rs
//!
//! An async Rust library that simulates a sunrise on Tuya smart bulbs over
//! the local TCP protocol.
//!
//! The crate has two halves: a codec and device session for the Tuya local
//! protocol (v3.1 to v3.3), and a ramp controller that walks bulbs from a
//! deep-red glimmer to full daylight over a configurable duration.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use tuya_sunrise_rs::{Controller, DeviceDescriptor, StartAt, Version};
//!
//! // Works with any async runtime!
//! async fn wake_up() -> Result<(), Box<dyn std::error::Error>> {
//!     let bulb = DeviceDescriptor::new(
//!         "bf1234567890abcdef",
//!         "192.168.1.40",
//!         "0123456789abcdef".parse()?,
//!         Version::V33,
//!     )
//!     .with_name("Bedroom");
//!
//!     let controller = Controller::default();
//!     let report = controller.run_test_ramp(&[bulb], Duration::from_secs(60)).await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Wire Codec**: Build and parse frames with [`encode`] and [`decode`]
//! - **Device Sessions**: Reliable request/response with one retry using [`Device`]
//! - **Sunrise Curve**: Piecewise-linear brightness and warmth with [`Curve`]
//! - **Ramps**: Drift-free, cancellable control loop via [`Controller`] and [`RampSession`]
//! - **Scheduling**: Fixed or sunrise-relative start times with [`StartMode`]
//! - **Status**: Live data point queries returning [`DeviceStatus`]
//!
//! ## Communication
//!
//! Bulbs listen on TCP port 6668. Every request is a framed, CRC-checked
//! message; from protocol 3.2 the payload is AES-128 encrypted with the
//! bulb's local key, which has to be obtained from the Tuya cloud once.
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! tuya-sunrise-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! tuya-sunrise-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! tuya-sunrise-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

mod cancel;
mod controller;
mod crypto;
mod curve;
mod descriptor;
mod device;
mod dps;
mod errors;
mod protocol;
mod ramp;
pub mod runtime;
mod schedule;
mod status;
mod types;

// Re-export public API
pub use cancel::CancelToken;
pub use controller::{Controller, RampHandle};
pub use curve::{Curve, CurvePoint};
pub use descriptor::{DeviceDescriptor, LocalKey};
pub use device::{Device, SessionOptions};
pub use dps::Dps;
pub use errors::Error;
pub use protocol::{Command, Decoded, Frame, Version, decode, encode};
pub use ramp::{Bulb, BulbReport, RampConfig, RampReport, RampSession, RampState};
pub use schedule::{StartAt, StartMode};
pub use status::{DeviceReport, DeviceStatus};
pub use types::{Brightness, ColorTemp, PowerMode, WorkMode};
