#![allow(dead_code)]

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::{sleep, timeout, timeout_at, Instant};
use vmodem::{BoxedStream, Modem, ModemConfig, ModemError, ModemStatus, OutgoingCall};

/// Builds a modem over an in-memory terminal and returns the peer end as a
/// [`TtyProbe`] for driving it.
pub fn new_modem(configure: impl FnOnce(&mut ModemConfig)) -> (Modem, TtyProbe) {
    let (local, peer) = duplex(4096);
    let mut config = ModemConfig {
        id: "test".into(),
        tty: Some(Box::new(local)),
        ..Default::default()
    };
    configure(&mut config);
    let modem = Modem::new(config).expect("modem construction");
    (modem, TtyProbe::new(peer))
}

/// In-memory phone line: returns both ends of a fresh byte stream.
pub fn phone_line() -> (BoxedStream, DuplexStream) {
    let (near, far) = duplex(4096);
    (Box::new(near), far)
}

/// Test handle for the terminal side of a modem: sends keystrokes, captures
/// everything the modem writes back.
pub struct TtyProbe {
    stream: DuplexStream,
    captured: Vec<u8>,
}

impl TtyProbe {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            captured: Vec::new(),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream
            .write_all(bytes)
            .await
            .expect("write to modem terminal");
    }

    /// Everything captured so far, lossily decoded.
    pub fn captured(&self) -> String {
        String::from_utf8_lossy(&self.captured).into_owned()
    }

    pub fn clear(&mut self) {
        self.captured.clear();
    }

    /// Reads terminal output until `pattern` shows up; panics on timeout or
    /// stream loss. Returns the full capture.
    pub async fn read_until(&mut self, pattern: &str, limit: Duration) -> String {
        let deadline = Instant::now() + limit;
        let mut buf = [0u8; 256];
        loop {
            if self.captured().contains(pattern) {
                return self.captured();
            }
            if Instant::now() >= deadline {
                panic!("timed out waiting for {pattern:?}; captured {:?}", self.captured());
            }
            match timeout_at(deadline, self.stream.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => self.captured.extend_from_slice(&buf[..n]),
                Ok(_) => panic!("terminal closed while waiting for {pattern:?}; captured {:?}", self.captured()),
                Err(_) => panic!("timed out waiting for {pattern:?}; captured {:?}", self.captured()),
            }
        }
    }

    /// Asserts the modem stays quiet for the whole window.
    pub async fn assert_no_output(&mut self, window: Duration) {
        let mut buf = [0u8; 256];
        match timeout(window, self.stream.read(&mut buf)).await {
            Err(_) => {}
            Ok(Ok(n)) if n > 0 => {
                panic!("expected silence, got {:?}", String::from_utf8_lossy(&buf[..n]))
            }
            Ok(_) => panic!("terminal closed while expecting silence"),
        }
    }
}

/// Reads exactly `n` bytes from the peer side of a line. The relay may
/// deliver them in arbitrarily small chunks.
pub async fn collect_bytes(stream: &mut DuplexStream, n: usize, limit: Duration) -> Vec<u8> {
    let deadline = Instant::now() + limit;
    let mut collected = Vec::with_capacity(n);
    let mut buf = [0u8; 256];
    while collected.len() < n {
        match timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(got)) if got > 0 => collected.extend_from_slice(&buf[..got]),
            Ok(_) => panic!("peer stream closed after {} of {n} bytes", collected.len()),
            Err(_) => panic!("timed out after {} of {n} bytes", collected.len()),
        }
    }
    collected
}

/// Polls until the modem reaches `want` or the limit expires.
pub async fn wait_for_status(modem: &Modem, want: ModemStatus, limit: Duration) {
    let deadline = Instant::now() + limit;
    loop {
        let status = modem.status().await;
        if status == want {
            return;
        }
        if Instant::now() >= deadline {
            panic!("status stuck at {status}, wanted {want}");
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Scripted outgoing-call callback: hands out a prepared stream (or fails
/// with `NO CARRIER`), optionally after a delay, and records the number it
/// was asked to dial.
pub struct TestDialer {
    conn: StdMutex<Option<BoxedStream>>,
    delay: Option<Duration>,
    pub dialed: StdMutex<Option<String>>,
}

impl TestDialer {
    pub fn with_stream(stream: BoxedStream) -> Arc<Self> {
        Arc::new(Self {
            conn: StdMutex::new(Some(stream)),
            delay: None,
            dialed: StdMutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            conn: StdMutex::new(None),
            delay: None,
            dialed: StdMutex::new(None),
        })
    }

    pub fn slow(stream: BoxedStream, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            conn: StdMutex::new(Some(stream)),
            delay: Some(delay),
            dialed: StdMutex::new(None),
        })
    }
}

#[async_trait]
impl OutgoingCall for TestDialer {
    async fn dial(&self, _modem: &Modem, number: &str) -> Result<BoxedStream, ModemError> {
        *self.dialed.lock().unwrap() = Some(number.to_string());
        if let Some(delay) = self.delay {
            sleep(delay).await;
        }
        self.conn
            .lock()
            .unwrap()
            .take()
            .ok_or(ModemError::NoCarrier)
    }
}
