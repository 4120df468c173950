//! The sunrise control loop.
//!
//! A [`RampSession`] walks a [`Curve`] over a fixed duration and pushes the
//! current target to every bulb on a fixed tick grid. Per-bulb failures are
//! logged and retried on the next tick; they never stop the ramp. The last
//! action of a completed ramp is a forced apply of the curve's end point.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{Either, join_all, select};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::cancel::CancelToken;
use crate::curve::{Curve, CurvePoint};
use crate::dps::Dps;
use crate::errors::Error;
use crate::runtime::{self, Instant};

type Result<T> = std::result::Result<T, Error>;

/// Something the ramp can drive.
///
/// Implemented by [`crate::Device`]; anything else that accepts data points
/// can stand in for a bulb.
pub trait Bulb: Send {
    /// Name used in log lines and reports.
    fn label(&self) -> &str;

    /// Apply a set of data points, returning once the bulb has acknowledged.
    fn apply(&mut self, dps: &Dps) -> impl Future<Output = Result<()>> + Send;

    /// Release any resources held for the bulb.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Timing and shape of a ramp.
///
/// ```
/// use std::time::Duration;
/// use tuya_sunrise_rs::RampConfig;
///
/// let config: RampConfig = serde_json::from_str(r#"{"duration_secs": 600}"#).unwrap();
/// assert_eq!(config.duration, Duration::from_secs(600));
/// assert_eq!(config.tick_interval, Duration::from_secs(15));
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "duration_secs")]
    pub duration: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "tick_interval_secs")]
    pub tick_interval: Duration,
    /// Changes of at most this many device units are not sent.
    pub min_change: u16,
    pub curve: Curve,
}

impl Default for RampConfig {
    fn default() -> Self {
        RampConfig {
            duration: Duration::from_secs(30 * 60),
            tick_interval: Duration::from_secs(15),
            min_change: 2,
            curve: Curve::sunrise(),
        }
    }
}

impl RampConfig {
    pub fn with_duration(duration: Duration) -> Self {
        RampConfig {
            duration,
            ..Self::default()
        }
    }

    /// A short ramp for trying bulbs out: same curve, roughly thirty ticks.
    pub fn test(duration: Duration) -> Self {
        let tick = (duration / 30).clamp(Duration::from_secs(1), Self::default().tick_interval);
        RampConfig {
            duration,
            tick_interval: tick,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(Error::InvalidConfig("duration must be positive".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::InvalidConfig("tick interval must be positive".into()));
        }
        Ok(())
    }
}

/// Lifecycle of a ramp.
///
/// `Idle → Starting → Running → Completing → Done`, with `Cancelled`
/// reachable from `Idle`, `Starting` and `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RampState {
    /// Created, waiting for the start time.
    Idle,
    /// Powering bulbs on at the curve's first point.
    Starting,
    /// Periodic ticks.
    Running,
    /// Forcing the curve's end point onto every bulb.
    Completing,
    Done,
    Cancelled,
}

impl RampState {
    pub fn can_advance_to(self, next: RampState) -> bool {
        use RampState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Idle, Cancelled)
                | (Starting, Running)
                | (Starting, Cancelled)
                | (Running, Completing)
                | (Running, Cancelled)
                | (Completing, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RampState::Done | RampState::Cancelled)
    }
}

/// Per-bulb outcome of a ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct BulbReport {
    pub label: String,
    /// Successfully acknowledged updates.
    pub applied: usize,
    pub failures: usize,
    pub last_applied: Option<CurvePoint>,
}

/// Summary returned when a ramp ends.
#[derive(Debug, Clone, PartialEq)]
pub struct RampReport {
    pub state: RampState,
    /// Periodic ticks evaluated (start and final applies not included).
    pub ticks: usize,
    pub bulbs: Vec<BulbReport>,
}

impl RampReport {
    pub fn completed(&self) -> bool {
        self.state == RampState::Done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Push {
    /// Power on and first point; always sent.
    Initial,
    /// Periodic update; suppressed when the change is too small.
    Tick,
    /// End point; always sent, ignores cancellation.
    Final,
}

struct Slot<B> {
    bulb: B,
    last_applied: Option<CurvePoint>,
    applied: usize,
    failures: usize,
}

/// Runtime state of one sunrise.
///
/// The session is the only owner of the per-bulb "last applied" points;
/// bulbs know nothing about the curve.
pub struct RampSession<B: Bulb> {
    config: RampConfig,
    slots: Vec<Slot<B>>,
    cancel: CancelToken,
    state: RampState,
    ticks: usize,
}

impl<B: Bulb> RampSession<B> {
    pub fn new(bulbs: Vec<B>, config: RampConfig, cancel: CancelToken) -> Result<Self> {
        config.validate()?;
        let slots = bulbs
            .into_iter()
            .map(|bulb| Slot {
                bulb,
                last_applied: None,
                applied: 0,
                failures: 0,
            })
            .collect();
        Ok(RampSession {
            config,
            slots,
            cancel,
            state: RampState::Idle,
            ticks: 0,
        })
    }

    pub fn state(&self) -> RampState {
        self.state
    }

    /// Wait `delay`, then run the ramp. Cancelling while waiting ends the
    /// session without touching any bulb.
    pub async fn run_after(self, delay: Duration) -> RampReport {
        if !delay.is_zero() {
            info!("sunrise ramp starts in {}s", delay.as_secs());
        }
        if self.wait(delay).await {
            return self.finish(RampState::Cancelled).await;
        }
        self.run_now().await
    }

    /// Run the ramp from now until it completes or is cancelled.
    pub async fn run(self) -> RampReport {
        self.run_now().await
    }

    async fn run_now(mut self) -> RampReport {
        let duration = self.config.duration;
        let tick = self.config.tick_interval;
        let start = Instant::now();

        self.advance(RampState::Starting);
        info!(
            "sunrise ramp started: {} bulb(s), {}s, tick {}s",
            self.slots.len(),
            duration.as_secs(),
            tick.as_secs_f64()
        );
        let first = self.config.curve.start();
        if !self.push(first, Push::Initial).await {
            return self.finish(RampState::Cancelled).await;
        }

        self.advance(RampState::Running);
        loop {
            let next = next_tick(start.elapsed(), tick);
            if next >= duration {
                break;
            }
            if self.wait(next.saturating_sub(start.elapsed())).await {
                return self.finish(RampState::Cancelled).await;
            }

            let point = self.config.curve.at_elapsed(start.elapsed(), duration);
            self.ticks += 1;
            debug!(
                "tick {}: {:.0}% brightness={} temp={}",
                self.ticks,
                point.progress * 100.0,
                point.brightness,
                point.color_temp
            );
            if !self.push(point, Push::Tick).await {
                return self.finish(RampState::Cancelled).await;
            }
        }

        if self.wait(duration.saturating_sub(start.elapsed())).await {
            return self.finish(RampState::Cancelled).await;
        }

        self.advance(RampState::Completing);
        let end = self.config.curve.end();
        self.push(end, Push::Final).await;
        self.finish(RampState::Done).await
    }

    /// Send `point` to every bulb concurrently; the tick ends when all sends
    /// have finished. Returns false if the ramp was cancelled.
    async fn push(&mut self, point: CurvePoint, kind: Push) -> bool {
        let epsilon = self.config.min_change;
        let cancel = &self.cancel;

        let sends = self.slots.iter_mut().map(|slot| async move {
            let dps = match (kind, slot.last_applied) {
                (Push::Tick, Some(last)) if !point.differs_from(&last, epsilon) => return,
                (Push::Tick, Some(_)) => Dps::levels(&point),
                // First contact, end point, or a bulb that has never acknowledged
                _ => Dps::white(&point),
            };
            if kind != Push::Final && cancel.is_cancelled() {
                return;
            }
            match slot.bulb.apply(&dps).await {
                Ok(()) => {
                    slot.last_applied = Some(point);
                    slot.applied += 1;
                }
                Err(e) => {
                    slot.failures += 1;
                    warn!("{}: update failed, retrying next tick: {e}", slot.bulb.label());
                }
            }
        });
        join_all(sends).await;

        kind == Push::Final || !self.cancel.is_cancelled()
    }

    /// Sleep for `duration` unless cancelled first. Returns true if cancelled.
    async fn wait(&self, duration: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        if duration.is_zero() {
            return false;
        }
        let sleep = pin!(runtime::sleep(duration));
        let cancelled = pin!(self.cancel.cancelled());
        matches!(select(sleep, cancelled).await, Either::Right(_))
    }

    fn advance(&mut self, next: RampState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "bad transition {:?} -> {next:?}",
            self.state
        );
        debug!("ramp {:?} -> {next:?}", self.state);
        self.state = next;
    }

    async fn finish(mut self, state: RampState) -> RampReport {
        self.advance(state);
        for slot in &mut self.slots {
            slot.bulb.close().await;
        }

        match state {
            RampState::Done => info!("sunrise ramp complete after {} tick(s)", self.ticks),
            _ => info!("sunrise ramp cancelled after {} tick(s)", self.ticks),
        }

        RampReport {
            state,
            ticks: self.ticks,
            bulbs: self
                .slots
                .into_iter()
                .map(|slot| BulbReport {
                    label: slot.bulb.label().to_string(),
                    applied: slot.applied,
                    failures: slot.failures,
                    last_applied: slot.last_applied,
                })
                .collect(),
        }
    }
}

/// First point of the tick grid strictly after `elapsed`.
fn next_tick(elapsed: Duration, tick: Duration) -> Duration {
    let done = elapsed.as_nanos() / tick.as_nanos();
    tick.saturating_mul(u32::try_from(done + 1).unwrap_or(u32::MAX))
}
