use std::io;
use thiserror::Error;

/// The primary error type for the `cdas` library.
#[derive(Error, Debug)]
pub enum CdasError {
    #[error("Voltage {value} outside the 14-bit range [-8192, 8191]")]
    VoltageOutOfRange { value: i32 },

    #[error("Status byte 0x{byte:02x} at index {index} is a reserved framing byte")]
    ReservedStatusByte { byte: u8, index: usize },

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Unknown packet type 0x{0:02x}")]
    UnknownPacketType(u8),

    #[error("Checksum mismatch: computed 0x{expected:02x}, frame carries 0x{actual:02x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport is not open")]
    NotOpen,

    #[error("Transport lock poisoned by a panicking writer")]
    TransportPoisoned,
}
