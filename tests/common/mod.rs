//! A scripted Tuya bulb listening on localhost.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tuya_sunrise_rs::{
    Command, DeviceDescriptor, Error, Frame, LocalKey, SessionOptions, Version, decode, encode,
};

pub const KEY: &str = "0123456789abcdef";

/// How the fake bulb treats requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Answer,
    /// Hang up on the first connection right after reading a request.
    HangUpFirst,
    /// Never answer on the first connection.
    SilentFirst,
    /// Never answer at all.
    Silent,
    /// Send a frame with the wrong sequence before every answer.
    StaleFirst,
    /// Only ever send frames with the wrong sequence.
    OnlyStale,
    /// Answer everything with this return code.
    Reject(u32),
}

pub struct FakeDevice {
    pub port: u16,
    version: Version,
    accepts: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Frame>>>,
}

impl FakeDevice {
    pub async fn start(behavior: Behavior, version: Version) -> FakeDevice {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (counter, log) = (Arc::clone(&accepts), Arc::clone(&requests));
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let connection = counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, connection, behavior, version, Arc::clone(&log)));
            }
        });

        FakeDevice {
            port,
            version,
            accepts,
            requests,
        }
    }

    pub fn descriptor(&self, id: &str) -> DeviceDescriptor {
        let mut descriptor =
            DeviceDescriptor::new(id, "127.0.0.1", KEY.parse().unwrap(), self.version);
        descriptor.port = self.port;
        descriptor
    }

    /// Connections accepted so far.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Every request decoded so far, in arrival order.
    pub fn requests(&self) -> Vec<Frame> {
        self.requests.lock().unwrap().clone()
    }
}

/// Short timeouts so failure paths run quickly on the real clock.
pub fn fast_options() -> SessionOptions {
    SessionOptions {
        connect_timeout: Duration::from_millis(500),
        read_timeout: Duration::from_millis(300),
    }
}

async fn serve(
    mut socket: TcpStream,
    connection: usize,
    behavior: Behavior,
    version: Version,
    log: Arc<Mutex<Vec<Frame>>>,
) {
    let key: LocalKey = KEY.parse().unwrap();
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buffer.extend_from_slice(&chunk[..n]);

        loop {
            let request = match decode(&buffer, &key, version) {
                Ok(decoded) => {
                    buffer.drain(..decoded.consumed);
                    decoded.frame
                }
                Err(Error::FrameIncomplete { .. }) => break,
                Err(e) => panic!("fake device got a bad frame: {e}"),
            };
            log.lock().unwrap().push(request.clone());

            let seq = request.sequence;
            let first = connection == 0;
            let replies = match behavior {
                Behavior::HangUpFirst if first => return,
                Behavior::SilentFirst if first => vec![],
                Behavior::Silent => vec![],
                Behavior::StaleFirst => vec![reply(&request, seq + 100, 0), reply(&request, seq, 0)],
                Behavior::OnlyStale => vec![reply(&request, seq + 100, 0)],
                Behavior::Reject(code) => vec![reply(&request, seq, code)],
                _ => vec![reply(&request, seq, 0)],
            };
            for frame in replies {
                let bytes = encode(&frame, &key, version).unwrap();
                if socket.write_all(&bytes).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn reply(request: &Frame, sequence: u32, code: u32) -> Frame {
    let payload = match request.command {
        Command::DpQuery if code == 0 => Some(json!({
            "devId": "fake",
            "dps": {"20": true, "21": "white", "22": 500, "23": 200, "24": "000003e803e8"}
        })),
        _ => None,
    };
    Frame {
        sequence,
        command: request.command,
        return_code: Some(code),
        payload,
    }
}
