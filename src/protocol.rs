//! Tuya local protocol framing.
//!
//! Every message on the wire has the same shape:
//!
//! ```text
//! 000055AA | seq u32 | cmd u32 | len u32 | [retcode u32] payload | crc32 u32 | 0000AA55
//! ```
//!
//! All integers are big-endian. `len` counts everything after the 16-byte
//! header, i.e. return code, payload, checksum and suffix. The CRC-32 covers
//! the header and the body. How the payload itself is sealed depends on the
//! protocol [`Version`].
//!
//! The functions here are pure; [`crate::Device`] owns the I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto;
use crate::descriptor::LocalKey;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

pub const PREFIX: u32 = 0x0000_55AA;
pub const SUFFIX: u32 = 0x0000_AA55;

const HEADER_LEN: usize = 16;
const FOOTER_LEN: usize = 8;
const RETCODE_LEN: usize = 4;
const VERSION_TAG_LEN: usize = 15;
/// Largest return code [`encode`] accepts; [`decode`] recognises a return
/// code by its three leading zero bytes, so only the low byte may be set.
pub const MAX_RETURN_CODE: u32 = 0xFF;
/// Upper bound for the declared length; bulbs never send more than a few KiB.
const MAX_BODY_LEN: usize = 64 * 1024;

/// Protocol versions understood by this crate.
///
/// 3.1 sends plaintext JSON. 3.2 and 3.3 encrypt the JSON with the device's
/// local key and tag most messages with a 15-byte version header. 3.4 and
/// later negotiate session keys and are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "VersionRepr", into = "String")]
pub enum Version {
    V31,
    V32,
    #[default]
    V33,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V31 => "3.1",
            Version::V32 => "3.2",
            Version::V33 => "3.3",
        }
    }

    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Version::V31)
    }

    fn tag(&self) -> [u8; VERSION_TAG_LEN] {
        let mut tag = [0u8; VERSION_TAG_LEN];
        tag[..3].copy_from_slice(self.as_str().as_bytes());
        tag
    }

    /// Turn serialized JSON into the payload bytes for `command`.
    fn seal(&self, command: Command, key: &LocalKey, json: &[u8]) -> Vec<u8> {
        if !self.is_encrypted() {
            return json.to_vec();
        }
        let encrypted = crypto::encrypt(key, json);
        if command.takes_version_tag() {
            let mut out = Vec::with_capacity(VERSION_TAG_LEN + encrypted.len());
            out.extend_from_slice(&self.tag());
            out.extend_from_slice(&encrypted);
            out
        } else {
            encrypted
        }
    }

    /// Inverse of [`Version::seal`]. The tag is optional on input since
    /// firmware is inconsistent about echoing it.
    fn open(&self, key: &LocalKey, payload: &[u8]) -> Result<Vec<u8>> {
        if !self.is_encrypted() {
            return Ok(payload.to_vec());
        }
        let sealed = payload.strip_prefix(&self.tag()[..]).unwrap_or(payload);
        crypto::decrypt(key, sealed)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Version {
    type Err = Error;

    /// ```
    /// use tuya_sunrise_rs::Version;
    ///
    /// assert_eq!("3.1".parse::<Version>().unwrap(), Version::V31);
    /// assert_eq!("3.3".parse::<Version>().unwrap(), Version::V33);
    /// assert!("3.4".parse::<Version>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "3.1" => Ok(Version::V31),
            "3.2" => Ok(Version::V32),
            "3.3" => Ok(Version::V33),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.as_str().to_string()
    }
}

/// Configuration files write the version either as `"3.3"` or `3.3`.
#[derive(Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Text(String),
    Number(f64),
}

impl TryFrom<VersionRepr> for Version {
    type Error = Error;

    fn try_from(repr: VersionRepr) -> Result<Self> {
        match repr {
            VersionRepr::Text(s) => s.parse(),
            VersionRepr::Number(n) => format!("{n:.1}").parse(),
        }
    }
}

/// Command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Set data points.
    Control,
    /// Unsolicited state report from the device.
    Status,
    HeartBeat,
    /// Query all data points.
    DpQuery,
    ControlNew,
    DpQueryNew,
    UpdateDps,
    /// An opcode without a named variant. Build it with [`Command::from_id`],
    /// which maps known ids to their named variant; `Other(0x07)` encodes
    /// like [`Command::Control`] and decodes as `Control`.
    Other(u32),
}

impl Command {
    pub fn id(&self) -> u32 {
        match self {
            Command::Control => 0x07,
            Command::Status => 0x08,
            Command::HeartBeat => 0x09,
            Command::DpQuery => 0x0a,
            Command::ControlNew => 0x0d,
            Command::DpQueryNew => 0x10,
            Command::UpdateDps => 0x12,
            Command::Other(id) => *id,
        }
    }

    pub fn from_id(id: u32) -> Self {
        match id {
            0x07 => Command::Control,
            0x08 => Command::Status,
            0x09 => Command::HeartBeat,
            0x0a => Command::DpQuery,
            0x0d => Command::ControlNew,
            0x10 => Command::DpQueryNew,
            0x12 => Command::UpdateDps,
            other => Command::Other(other),
        }
    }

    /// Queries and heartbeats go out without the version header.
    fn takes_version_tag(&self) -> bool {
        !matches!(
            self,
            Command::DpQuery | Command::DpQueryNew | Command::HeartBeat
        )
    }
}

/// One logical protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u32,
    pub command: Command,
    /// Present on frames sent by the device. At most [`MAX_RETURN_CODE`].
    pub return_code: Option<u32>,
    pub payload: Option<Value>,
}

impl Frame {
    /// A client-to-device frame.
    pub fn request(sequence: u32, command: Command, payload: Option<Value>) -> Self {
        Frame {
            sequence,
            command,
            return_code: None,
            payload,
        }
    }

    /// False when the device reported a non-zero return code.
    pub fn is_success(&self) -> bool {
        self.return_code.is_none_or(|code| code == 0)
    }
}

/// Result of a successful [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub frame: Frame,
    /// Bytes of the input buffer that belonged to this frame.
    pub consumed: usize,
}

/// Encode a frame into wire bytes.
///
/// ```
/// use serde_json::json;
/// use tuya_sunrise_rs::{Command, Frame, LocalKey, Version, decode, encode};
///
/// let key: LocalKey = "0123456789abcdef".parse().unwrap();
/// let frame = Frame::request(1, Command::Control, Some(json!({"dps": {"20": true}})));
///
/// let bytes = encode(&frame, &key, Version::V33).unwrap();
/// assert_eq!(&bytes[..4], &[0x00, 0x00, 0x55, 0xAA]);
/// assert_eq!(&bytes[bytes.len() - 4..], &[0x00, 0x00, 0xAA, 0x55]);
///
/// let decoded = decode(&bytes, &key, Version::V33).unwrap();
/// assert_eq!(decoded.frame, frame);
/// assert_eq!(decoded.consumed, bytes.len());
/// ```
pub fn encode(frame: &Frame, key: &LocalKey, version: Version) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    if let Some(code) = frame.return_code {
        if code > MAX_RETURN_CODE {
            return Err(Error::FrameCorrupt(format!(
                "return code {code:#x} does not fit in one byte"
            )));
        }
        body.extend_from_slice(&code.to_be_bytes());
    }
    if let Some(payload) = &frame.payload {
        let json = serde_json::to_vec(payload).map_err(Error::JsonDump)?;
        body.extend_from_slice(&version.seal(frame.command, key, &json));
    }

    let len = body.len() + FOOTER_LEN;
    if len > MAX_BODY_LEN {
        return Err(Error::FrameCorrupt(format!("payload of {len} bytes is too large")));
    }

    let mut out = Vec::with_capacity(HEADER_LEN + len);
    out.extend_from_slice(&PREFIX.to_be_bytes());
    out.extend_from_slice(&frame.sequence.to_be_bytes());
    out.extend_from_slice(&frame.command.id().to_be_bytes());
    out.extend_from_slice(&(len as u32).to_be_bytes());
    out.extend_from_slice(&body);
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&SUFFIX.to_be_bytes());
    Ok(out)
}

/// Decode the first frame in `buf`.
///
/// `buf` may hold a partial frame ([`Error::FrameIncomplete`], read more and
/// call again) or more than one frame (use [`Decoded::consumed`] to advance).
pub fn decode(buf: &[u8], key: &LocalKey, version: Version) -> Result<Decoded> {
    if buf.len() >= 4 && read_u32(buf, 0) != PREFIX {
        return Err(Error::FrameCorrupt(format!(
            "bad prefix {:#010x}",
            read_u32(buf, 0)
        )));
    }
    if buf.len() < HEADER_LEN {
        return Err(Error::FrameIncomplete {
            needed: HEADER_LEN - buf.len(),
        });
    }

    let sequence = read_u32(buf, 4);
    let command = Command::from_id(read_u32(buf, 8));
    let len = read_u32(buf, 12) as usize;
    if !(FOOTER_LEN..=MAX_BODY_LEN).contains(&len) {
        return Err(Error::FrameCorrupt(format!("implausible length {len}")));
    }

    let total = HEADER_LEN + len;
    if buf.len() < total {
        return Err(Error::FrameIncomplete {
            needed: total - buf.len(),
        });
    }

    let frame = &buf[..total];
    if read_u32(frame, total - 4) != SUFFIX {
        return Err(Error::FrameCorrupt("bad suffix".into()));
    }
    let expected = read_u32(frame, total - FOOTER_LEN);
    let actual = crc32fast::hash(&frame[..total - FOOTER_LEN]);
    if expected != actual {
        return Err(Error::FrameCorrupt(format!(
            "checksum mismatch: declared {expected:#010x}, computed {actual:#010x}"
        )));
    }

    let body = &frame[HEADER_LEN..total - FOOTER_LEN];
    // Return codes fit in one byte, so a body led by three zero bytes carries one.
    // An untagged ciphertext can start that way too; fall back to reading the
    // whole body as payload when the split does not decode.
    let (return_code, payload) = if body.len() >= RETCODE_LEN && body[..3] == [0, 0, 0] {
        match open_payload(&body[RETCODE_LEN..], key, version) {
            Ok(payload) => (Some(read_u32(body, 0)), payload),
            Err(e) => match open_payload(body, key, version) {
                Ok(payload) => (None, payload),
                Err(_) => return Err(e),
            },
        }
    } else {
        (None, open_payload(body, key, version)?)
    };

    Ok(Decoded {
        frame: Frame {
            sequence,
            command,
            return_code,
            payload,
        },
        consumed: total,
    })
}

fn open_payload(body: &[u8], key: &LocalKey, version: Version) -> Result<Option<Value>> {
    if body.is_empty() {
        return Ok(None);
    }
    let plain = version.open(key, body)?;
    serde_json::from_slice::<Value>(&plain)
        .map(Some)
        .map_err(|e| Error::PayloadDecode(e.to_string()))
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
