use std::io;

/// All error types that can occur when talking to Tuya bulbs or running a ramp.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The buffer holds only part of a frame; read more bytes and retry.
    #[error("frame incomplete: need {needed} more byte(s)")]
    FrameIncomplete { needed: usize },

    /// Bad magic, bad length or checksum mismatch.
    #[error("corrupt frame: {0}")]
    FrameCorrupt(String),

    /// The frame was intact but its payload could not be decrypted or parsed.
    #[error("payload decode error: {0}")]
    PayloadDecode(String),

    /// The TCP connection to a bulb could not be established.
    #[error("device {device} unreachable: {err:?}")]
    DeviceUnreachable { device: String, err: io::Error },

    /// No matching response arrived before the read timeout.
    #[error("device {device} did not answer in time")]
    DeviceTimeout { device: String },

    /// Only responses to other requests arrived before the read timeout.
    #[error("stale response: expected sequence {expected}, got {received}")]
    SequenceMismatch { expected: u32, received: u32 },

    /// The bulb closed the connection mid-exchange.
    #[error("connection closed by device {0}")]
    ConnectionClosed(String),

    /// The bulb answered with a non-zero return code.
    #[error("device {device} rejected command with code {code}")]
    DeviceRejected { device: String, code: u32 },

    /// A network socket operation failed while communicating with a bulb.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: io::Error },

    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// The local key is not 16 bytes in any accepted encoding.
    #[error("invalid local key: {0}")]
    InvalidKey(String),

    /// Protocol versions with session-key negotiation are not supported.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(String),

    /// A curve violates ordering or range constraints.
    #[error("invalid curve: {0}")]
    InvalidCurve(String),

    /// Ramp timing settings that cannot produce a ramp.
    #[error("invalid ramp configuration: {0}")]
    InvalidConfig(String),

    /// Attempted to send a [`crate::Dps`] with no data points set.
    #[error("invalid payload; no data points set")]
    NoAttribute,

    /// Every supplied device is disabled (or none were supplied).
    #[error("no enabled devices")]
    NoDevices,

    /// A ramp is already running on this controller.
    #[error("a ramp is already active")]
    RampActive,
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new unreachable-device error
    pub fn unreachable(device: &str, err: io::Error) -> Self {
        Error::DeviceUnreachable {
            device: device.to_string(),
            err,
        }
    }

    /// Create a new device timeout error
    pub fn timeout(device: &str) -> Self {
        Error::DeviceTimeout {
            device: device.to_string(),
        }
    }

    /// Create a new rejected-command error
    pub fn rejected(device: &str, code: u32) -> Self {
        Error::DeviceRejected {
            device: device.to_string(),
            code,
        }
    }

    /// Whether a reconnect-and-retry may fix this failure.
    ///
    /// True for timeouts and lost connections; codec and device-level
    /// rejections would fail again the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::DeviceTimeout { .. } | Error::ConnectionClosed(_) | Error::Socket { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::timeout("bulb").is_retryable());
        assert!(Error::ConnectionClosed("bulb".into()).is_retryable());
        assert!(Error::socket("write", io::Error::from(io::ErrorKind::BrokenPipe)).is_retryable());
        assert!(!Error::FrameCorrupt("crc".into()).is_retryable());
        assert!(!Error::rejected("bulb", 1).is_retryable());
        assert!(!Error::unreachable("bulb", io::Error::from(io::ErrorKind::TimedOut)).is_retryable());
    }
}
