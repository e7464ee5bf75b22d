//! Byte sinks the controller writes packets to.

use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_PORT};
use crate::error::CdasError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Default timeout for serial writes
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Opaque output channel to the scanner.
///
/// Only the tick thread writes while the transport is open; `open` and
/// `close` are called by the controller around the lifetime of that thread.
pub trait Transport: Send + 'static {
    fn is_open(&self) -> bool;

    fn open(&mut self) -> Result<(), CdasError>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), CdasError>;

    fn close(&mut self) -> Result<(), CdasError>;
}

/// Serial line settings. Parity, stop bits and flow control are fixed by the
/// scanner: 8N1 with XON/XOFF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SerialConfig {
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Transport over a local serial device. The port is opened lazily by
/// [`Transport::open`].
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self { config, port: None }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn open(&mut self) -> Result<(), CdasError> {
        if self.port.is_some() {
            return Ok(());
        }

        debug!(port = %self.config.port, baud = self.config.baud_rate, "Opening serial port");
        let port = serialport::new(self.config.port.as_str(), self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Software)
            .timeout(self.config.timeout)
            .open()?;
        info!(port = %self.config.port, "Serial port opened");

        self.port = Some(port);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), CdasError> {
        let port = self.port.as_mut().ok_or(CdasError::NotOpen)?;
        port.write_all(bytes)?;
        trace!(bytes = hex::encode(bytes), "Serial write");
        Ok(())
    }

    fn close(&mut self) -> Result<(), CdasError> {
        if self.port.take().is_some() {
            info!(port = %self.config.port, "Serial port closed");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}
