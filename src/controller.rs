//! Control surface: start, cancel and inspect sunrise ramps.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use futures::future::join_all;
use log::{info, warn};

use crate::cancel::CancelToken;
use crate::descriptor::DeviceDescriptor;
use crate::device::{Device, SessionOptions};
use crate::errors::Error;
use crate::ramp::{RampConfig, RampReport, RampSession};
use crate::runtime::{self, JoinHandle};
use crate::schedule::{StartAt, StartMode};
use crate::status::DeviceReport;

type Result<T> = std::result::Result<T, Error>;

type ActiveSlot = Arc<Mutex<Option<CancelToken>>>;

/// Entry point for driving bulbs.
///
/// At most one ramp runs per controller. Every ramp opens its own device
/// sessions and closes them when it ends.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tuya_sunrise_rs::{Controller, DeviceDescriptor, RampConfig, StartAt, Version};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let bedroom = DeviceDescriptor::new(
///     "bf1234567890abcdef",
///     "192.168.1.40",
///     "0123456789abcdef".parse()?,
///     Version::V33,
/// );
///
/// let controller = Controller::default();
/// let handle = controller.start_ramp(&[bedroom], RampConfig::default(), StartAt::Now)?;
/// let report = handle.wait().await;
/// assert!(report.completed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Controller {
    options: SessionOptions,
    active: ActiveSlot,
}

impl Controller {
    pub fn new(options: SessionOptions) -> Self {
        Controller {
            options,
            active: ActiveSlot::default(),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether a ramp is running or waiting for its start time.
    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Start a ramp over every enabled device.
    ///
    /// The ramp runs in a background task and waits for `start` first;
    /// cancelling during the wait leaves the bulbs untouched.
    pub fn start_ramp(
        &self,
        devices: &[DeviceDescriptor],
        config: RampConfig,
        start: StartAt,
    ) -> Result<RampHandle> {
        let cancel = CancelToken::new();
        let session = RampSession::new(self.sessions(devices)?, config, cancel.clone())?;
        let reservation = self.reserve(&cancel)?;

        let delay = start.delay_from(Local::now());
        let join = runtime::spawn(async move {
            let _reservation = reservation;
            session.run_after(delay).await
        });

        Ok(RampHandle { cancel, join })
    }

    /// Start a ramp at the next occurrence of `mode`.
    pub fn schedule_ramp(
        &self,
        devices: &[DeviceDescriptor],
        config: RampConfig,
        mode: &StartMode,
    ) -> Result<RampHandle> {
        let start = StartAt::from(mode);
        if let StartAt::At(at) = start {
            info!("next sunrise ramp at {}", at.format("%Y-%m-%d %H:%M:%S"));
        }
        self.start_ramp(devices, config, start)
    }

    /// Cancel the active ramp. Returns false if there was nothing to cancel.
    pub fn cancel_ramp(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Query one bulb with a live status query.
    pub async fn query_status(&self, device: &DeviceDescriptor) -> DeviceReport {
        let mut session = Device::new(device.clone(), self.options);
        let report = match session.status().await {
            Ok(status) => DeviceReport::Reachable(status),
            Err(e) => {
                warn!("{}: status query failed: {e}", device.label());
                DeviceReport::Unreachable(e.to_string())
            }
        };
        session.close().await;
        report
    }

    /// Query every enabled bulb concurrently.
    pub async fn query_all(&self, devices: &[DeviceDescriptor]) -> Vec<(String, DeviceReport)> {
        let queries = devices
            .iter()
            .filter(|d| d.enabled)
            .map(|d| async move { (d.label().to_string(), self.query_status(d).await) });
        join_all(queries).await
    }

    /// Run a short ramp to completion in the calling task.
    ///
    /// Counts as the active ramp while it runs, so [`Controller::cancel_ramp`]
    /// stops it and [`Controller::start_ramp`] is refused.
    pub async fn run_test_ramp(
        &self,
        devices: &[DeviceDescriptor],
        duration: Duration,
    ) -> Result<RampReport> {
        let cancel = CancelToken::new();
        let session = RampSession::new(
            self.sessions(devices)?,
            RampConfig::test(duration),
            cancel.clone(),
        )?;
        let _reservation = self.reserve(&cancel)?;

        info!("running {}s test ramp", duration.as_secs());
        Ok(session.run().await)
    }

    fn sessions(&self, devices: &[DeviceDescriptor]) -> Result<Vec<Device>> {
        let sessions: Vec<Device> = devices
            .iter()
            .filter(|d| d.enabled)
            .map(|d| Device::new(d.clone(), self.options))
            .collect();
        if sessions.is_empty() {
            return Err(Error::NoDevices);
        }
        Ok(sessions)
    }

    /// Claim the active slot for `cancel` until the returned guard drops.
    fn reserve(&self, cancel: &CancelToken) -> Result<Reservation> {
        let mut active = lock(&self.active);
        if active.is_some() {
            return Err(Error::RampActive);
        }
        *active = Some(cancel.clone());
        Ok(Reservation {
            active: Arc::clone(&self.active),
            token: cancel.clone(),
        })
    }
}

/// Holds the active slot; released however the ramp's future ends,
/// including being dropped part-way.
struct Reservation {
    active: ActiveSlot,
    token: CancelToken,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut slot = lock(&self.active);
        if slot.as_ref().is_some_and(|t| t.same_as(&self.token)) {
            *slot = None;
        }
    }
}

/// A ramp running in the background.
///
/// Under `runtime-smol`, dropping the handle stops the ramp; keep it alive
/// (or call [`RampHandle::wait`]) for as long as the ramp should run.
pub struct RampHandle {
    cancel: CancelToken,
    join: JoinHandle<RampReport>,
}

impl RampHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this ramp, for handing to other tasks.
    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the ramp to finish.
    pub async fn wait(self) -> RampReport {
        self.join.await
    }
}

fn lock(active: &Mutex<Option<CancelToken>>) -> MutexGuard<'_, Option<CancelToken>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use super::*;
    use crate::protocol::Version;

    fn descriptor(id: &str, enabled: bool) -> DeviceDescriptor {
        let mut d = DeviceDescriptor::new(
            id,
            "127.0.0.1",
            "0123456789abcdef".parse().unwrap(),
            Version::V33,
        );
        d.enabled = enabled;
        d
    }

    #[tokio::test]
    async fn test_no_enabled_devices() {
        let controller = Controller::default();
        let result = controller.start_ramp(
            &[descriptor("a", false)],
            RampConfig::default(),
            StartAt::Now,
        );
        assert!(matches!(result, Err(Error::NoDevices)));
        assert!(matches!(
            controller.run_test_ramp(&[], Duration::from_secs(10)).await,
            Err(Error::NoDevices)
        ));
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_single_active_ramp() {
        let controller = Controller::default();
        let devices = [descriptor("a", true)];
        let start = StartAt::At(Local::now() + chrono::TimeDelta::hours(1));

        let handle = controller
            .start_ramp(&devices, RampConfig::default(), start)
            .unwrap();
        assert!(controller.is_active());
        assert!(matches!(
            controller.start_ramp(&devices, RampConfig::default(), StartAt::Now),
            Err(Error::RampActive)
        ));

        assert!(controller.cancel_ramp());
        assert!(!controller.cancel_ramp());
        let report = handle.wait().await;
        assert_eq!(report.state, crate::ramp::RampState::Cancelled);
        assert_eq!(report.bulbs[0].applied, 0);
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_dropped_test_ramp_frees_slot() {
        let controller = Controller::default();
        let devices = [descriptor("a", true)];

        let cut_short = tokio::time::timeout(
            Duration::from_millis(300),
            controller.run_test_ramp(&devices, Duration::from_secs(30)),
        )
        .await;
        assert!(cut_short.is_err());
        assert!(!controller.is_active());

        let later = StartAt::At(Local::now() + chrono::TimeDelta::hours(1));
        let handle = controller
            .start_ramp(&devices, RampConfig::default(), later)
            .unwrap();
        handle.cancel();
        assert_eq!(handle.wait().await.state, crate::ramp::RampState::Cancelled);
        assert!(!controller.is_active());
    }
}
