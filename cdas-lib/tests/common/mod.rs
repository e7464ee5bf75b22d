//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use cdas_lib::constants::*;
#[allow(unused_imports)]
pub use cdas_lib::packet::{
    MAX_PPU_PACKET, Mode, Packet, PacketType, Signal, Status, Voltages, ZERO_PACKET, compute_checksum,
    construct_packet, decode_voltage, encode_voltage,
};
#[allow(unused_imports)]
pub use cdas_lib::scheduler::{Action, Actions, SchedulerConfig, SignalScheduler};
#[allow(unused_imports)]
pub use cdas_lib::{Cdas, CdasError, Transport};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Frames written to a [`RecordingTransport`], shared with the test body
#[derive(Debug, Clone, Default)]
pub struct Wire {
    frames: Arc<Mutex<Vec<(Instant, Bytes)>>>,
}

#[allow(dead_code)]
impl Wire {
    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().unwrap().iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.frames.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }

    fn push(&self, frame: &[u8]) {
        self.frames
            .lock()
            .unwrap()
            .push((Instant::now(), Bytes::copy_from_slice(frame)));
    }
}

/// In-memory transport recording every write while open
#[derive(Debug, Default)]
pub struct RecordingTransport {
    open: bool,
    fail_open: bool,
    pub opens: usize,
    pub closes: usize,
    wire: Wire,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> (Self, Wire) {
        let transport = Self::default();
        let wire = transport.wire.clone();
        (transport, wire)
    }

    /// Transport whose `open` always fails
    pub fn unplugged() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

impl Transport for RecordingTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), CdasError> {
        if self.fail_open {
            return Err(CdasError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such device",
            )));
        }
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), CdasError> {
        if !self.open {
            return Err(CdasError::NotOpen);
        }
        self.wire.push(bytes);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CdasError> {
        self.open = false;
        self.closes += 1;
        Ok(())
    }
}

/// Lengths of the runs of consecutive frames equal to `frame`
#[allow(dead_code)]
pub fn runs_of(frames: &[Bytes], frame: &[u8]) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut current = 0;
    for f in frames {
        if f.as_ref() == frame {
            current += 1;
        } else if current > 0 {
            runs.push(current);
            current = 0;
        }
    }
    if current > 0 {
        runs.push(current);
    }
    runs
}

/// Route library logs to the test harness. `RUST_LOG` overrides the level.
#[allow(dead_code)]
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cdas_lib=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll `cond` every millisecond until it holds or `timeout` passes
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}
