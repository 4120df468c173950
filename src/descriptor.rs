//! Device identity: id, address, local key and protocol version.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::errors::Error;
use crate::protocol::Version;

/// The per-device AES key obtained during cloud pairing.
///
/// Tuya hands keys out as 16 printable characters which are used byte for
/// byte. Hex (32 characters) and base64 encodings of 16 raw bytes are
/// accepted too.
///
/// ```
/// use tuya_sunrise_rs::LocalKey;
///
/// let key: LocalKey = "0123456789abcdef".parse().unwrap();
/// assert_eq!(key.as_bytes(), b"0123456789abcdef");
///
/// let hex: LocalKey = "30313233343536373839616263646566".parse().unwrap();
/// assert_eq!(hex, key);
///
/// assert!("too-short".parse::<LocalKey>().is_err());
/// ```
#[derive(Clone, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct LocalKey([u8; 16]);

impl LocalKey {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        LocalKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for LocalKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 16 {
            let mut key = [0u8; 16];
            key.copy_from_slice(s.as_bytes());
            return Ok(LocalKey(key));
        }

        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            let mut key = [0u8; 16];
            for (i, byte) in key.iter_mut().enumerate() {
                *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16)
                    .map_err(|e| Error::InvalidKey(e.to_string()))?;
            }
            return Ok(LocalKey(key));
        }

        let decoded = STANDARD
            .decode(s)
            .map_err(|_| Error::InvalidKey("expected 16 chars, 32 hex digits or base64".into()))?;
        let key: [u8; 16] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| Error::InvalidKey(format!("decoded to {} bytes", v.len())))?;
        Ok(LocalKey(key))
    }
}

/// Serializes as hex so arbitrary key bytes survive a round trip.
impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LocalKey(<redacted>)")
    }
}

/// Everything needed to reach and talk to one bulb.
///
/// Descriptors normally come from an external configuration file:
///
/// ```
/// use tuya_sunrise_rs::{DeviceDescriptor, Version};
///
/// let json = r#"{
///     "id": "bf1234567890abcdef",
///     "name": "bedroom",
///     "address": "192.168.1.40",
///     "local_key": "0123456789abcdef",
///     "version": 3.3
/// }"#;
/// let device: DeviceDescriptor = serde_json::from_str(json).unwrap();
/// assert_eq!(device.version, Version::V33);
/// assert_eq!(device.port, 6668);
/// assert!(device.enabled);
/// assert_eq!(device.socket_addr(), "192.168.1.40:6668");
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: Option<String>,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub local_key: LocalKey,
    #[serde(default)]
    pub version: Version,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl DeviceDescriptor {
    pub const DEFAULT_PORT: u16 = 6668;

    pub fn new(id: &str, address: &str, local_key: LocalKey, version: Version) -> Self {
        DeviceDescriptor {
            id: id.to_string(),
            name: None,
            address: address.to_string(),
            port: Self::DEFAULT_PORT,
            local_key,
            version,
            enabled: true,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Name for log lines: the friendly name when set, the id otherwise.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn default_port() -> u16 {
    DeviceDescriptor::DEFAULT_PORT
}

fn default_enabled() -> bool {
    true
}
