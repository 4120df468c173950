//! One TCP session with one Tuya bulb.

use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::curve::CurvePoint;
use crate::descriptor::DeviceDescriptor;
use crate::dps::Dps;
use crate::errors::Error;
use crate::protocol::{self, Command, Decoded, Frame};
use crate::ramp::Bulb;
use crate::runtime::{self, AsyncTcpStream, TcpStream};
use crate::status::DeviceStatus;
use crate::types::PowerMode;

type Result<T> = std::result::Result<T, Error>;

/// Network timeouts for a device session.
///
/// Both are independent and kept well below a ramp tick so one offline
/// bulb cannot hold up the others for long.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "read_timeout_ms")]
    pub read_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            connect_timeout: Duration::from_secs(4),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// A session with a single Tuya bulb.
///
/// The session owns its TCP connection exclusively. Commands are strictly
/// ordered: each request gets the next sequence number and only the
/// response carrying that number completes it.
///
/// # Example
///
/// ```no_run
/// use tuya_sunrise_rs::{CurvePoint, Device, DeviceDescriptor, SessionOptions, Version};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let descriptor = DeviceDescriptor::new(
///     "bf1234567890abcdef",
///     "192.168.1.40",
///     "0123456789abcdef".parse()?,
///     Version::V33,
/// );
/// let mut bulb = Device::open(descriptor, SessionOptions::default()).await?;
/// bulb.set_white(&CurvePoint::new(0.0, 10, 0)).await?;
/// println!("{:?}", bulb.status().await?);
/// bulb.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Device {
    descriptor: DeviceDescriptor,
    options: SessionOptions,
    stream: Option<TcpStream>,
    sequence: u32,
    buffer: Vec<u8>,
    /// Sequence of the last response dropped as stale during this exchange.
    stale: Option<u32>,
}

impl Device {
    /// Create a session without connecting; the first command connects.
    pub fn new(descriptor: DeviceDescriptor, options: SessionOptions) -> Self {
        Device {
            descriptor,
            options,
            stream: None,
            sequence: 0,
            buffer: Vec::new(),
            stale: None,
        }
    }

    /// Create a session and connect right away.
    pub async fn open(descriptor: DeviceDescriptor, options: SessionOptions) -> Result<Self> {
        let mut device = Device::new(descriptor, options);
        device.connect().await?;
        Ok(device)
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn label(&self) -> &str {
        self.descriptor.label()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Sequence number of the most recent request.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// (Re)open the TCP connection. Sequence numbers restart at 1.
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await;

        let addr = self.descriptor.socket_addr();
        debug!("{}: connecting to {addr}", self.label());
        let stream = runtime::timeout(self.options.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                Error::unreachable(
                    self.label(),
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timeout"),
                )
            })?
            .map_err(|e| Error::unreachable(self.label(), e))?;

        self.stream = Some(stream);
        self.sequence = 0;
        Ok(())
    }

    /// Release the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("{}: shutdown: {e}", self.label());
            }
        }
        self.buffer.clear();
    }

    /// Send one command and wait for its response.
    ///
    /// A timeout or a lost connection triggers exactly one reconnect and
    /// retry; a second failure is returned to the caller.
    pub async fn send_command(&mut self, command: Command, payload: Option<Value>) -> Result<Frame> {
        match self.exchange(command, payload.as_ref()).await {
            Err(e) if e.is_retryable() => {
                warn!("{}: {e}; reconnecting for one retry", self.label());
                self.close().await;
                let retried = self.exchange(command, payload.as_ref()).await;
                if matches!(&retried, Err(e) if e.is_retryable()) {
                    self.close().await;
                }
                retried
            }
            other => other,
        }
    }

    /// Apply a set of data points.
    pub async fn set_dps(&mut self, dps: &Dps) -> Result<()> {
        if !dps.is_valid() {
            return Err(Error::NoAttribute);
        }
        let dps = serde_json::to_value(dps).map_err(Error::JsonDump)?;
        let payload = json!({
            "devId": self.descriptor.id,
            "uid": self.descriptor.id,
            "t": timestamp(),
            "dps": dps,
        });
        self.send_command(Command::Control, Some(payload)).await?;
        Ok(())
    }

    pub async fn set_power(&mut self, power: &PowerMode) -> Result<()> {
        self.set_dps(&Dps::from(power)).await
    }

    pub async fn turn_on(&mut self) -> Result<()> {
        self.set_power(&PowerMode::On).await
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.set_power(&PowerMode::Off).await
    }

    /// Power on in white mode at the given levels, in a single command.
    pub async fn set_white(&mut self, point: &CurvePoint) -> Result<()> {
        self.set_dps(&Dps::white(point)).await
    }

    /// Query every data point (live network call).
    pub async fn status(&mut self) -> Result<DeviceStatus> {
        let payload = json!({
            "gwId": self.descriptor.id,
            "devId": self.descriptor.id,
            "uid": self.descriptor.id,
            "t": timestamp(),
        });
        let frame = self.send_command(Command::DpQuery, Some(payload)).await?;
        let payload = frame
            .payload
            .ok_or_else(|| Error::PayloadDecode("empty status response".into()))?;
        DeviceStatus::from_payload(&payload)
    }

    /// Keep-alive; the bulb drops idle connections after a while.
    pub async fn heartbeat(&mut self) -> Result<()> {
        self.send_command(Command::HeartBeat, Some(json!({}))).await?;
        Ok(())
    }

    /// One request/response round trip, no retry.
    async fn exchange(&mut self, command: Command, payload: Option<&Value>) -> Result<Frame> {
        if self.stream.is_none() {
            self.connect().await?;
        }

        self.sequence = self.sequence.wrapping_add(1);
        self.stale = None;
        let request = Frame::request(self.sequence, command, payload.cloned());
        let bytes = protocol::encode(&request, &self.descriptor.local_key, self.descriptor.version)?;
        debug!(
            "{}: -> seq={} cmd={:?} ({} bytes)",
            self.label(),
            request.sequence,
            command,
            bytes.len()
        );

        let expected = request.sequence;
        let frame = match runtime::timeout(self.options.read_timeout, self.round_trip(&bytes, expected))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(match self.stale.take() {
                    Some(received) => Error::SequenceMismatch { expected, received },
                    None => Error::timeout(self.label()),
                });
            }
        };

        debug!(
            "{}: <- seq={} cmd={:?} rc={:?}",
            self.label(),
            frame.sequence,
            frame.command,
            frame.return_code
        );
        if frame.is_success() {
            Ok(frame)
        } else {
            Err(Error::rejected(
                self.label(),
                frame.return_code.unwrap_or_default(),
            ))
        }
    }

    async fn round_trip(&mut self, bytes: &[u8], expected: u32) -> Result<Frame> {
        let Device {
            descriptor,
            stream,
            buffer,
            stale,
            ..
        } = self;
        let label = descriptor.label();
        let Some(stream) = stream.as_mut() else {
            return Err(Error::ConnectionClosed(label.to_string()));
        };

        stream
            .write_all(bytes)
            .await
            .map_err(|e| Error::socket("write", e))?;

        let mut chunk = [0u8; 1024];
        loop {
            // Drain whatever is already buffered before reading more
            loop {
                match protocol::decode(&buffer[..], &descriptor.local_key, descriptor.version) {
                    Ok(Decoded { frame, consumed }) => {
                        buffer.drain(..consumed);
                        if frame.sequence == expected {
                            return Ok(frame);
                        }
                        debug!(
                            "{label}: dropping frame seq={} cmd={:?} while waiting for {expected}",
                            frame.sequence, frame.command
                        );
                        *stale = Some(frame.sequence);
                    }
                    Err(Error::FrameIncomplete { .. }) => break,
                    Err(e) => {
                        buffer.clear();
                        return Err(e);
                    }
                }
            }

            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| Error::socket("read", e))?;
            if n == 0 {
                return Err(Error::ConnectionClosed(label.to_string()));
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

impl Bulb for Device {
    fn label(&self) -> &str {
        Device::label(self)
    }

    async fn apply(&mut self, dps: &Dps) -> Result<()> {
        self.set_dps(dps).await
    }

    async fn close(&mut self) {
        Device::close(self).await
    }
}

fn timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}
