// Protocol constants for the CDAS trigger interface

use std::time::Duration;

/// Start of message
pub const SOM: u8 = 0x02;

/// End of message
pub const EOM: u8 = 0x0D;

/// Software flow control: resume transmission
pub const XON: u8 = 0x11;

/// Software flow control: pause transmission
pub const XOFF: u8 = 0x13;

/// Bytes the receiver treats as framing or flow control. None of them may
/// appear inside DATA or CKSUM.
pub const RESERVED_BYTES: [u8; 4] = [SOM, EOM, XON, XOFF];

/// Upper bound of a 14-bit two's complement voltage
pub const INT14_MAX: i32 = 8191;

/// Lower bound of a 14-bit two's complement voltage
pub const INT14_MIN: i32 = -8192;

/// Marker bit carried by every voltage byte
pub const VOLTAGE_MARKER: u8 = 0x80;

/// Payload bits per voltage byte
pub const VOLTAGE_BITS_MASK: u8 = 0x7F;

/// Bytes per encoded voltage channel
pub const VOLTAGE_SIZE: usize = 2;

/// Length of a status string built from [`crate::packet::Status`]
pub const STATUS_SIZE: usize = 5;

/// SOM + type byte + CKSUM + EOM
pub const FRAME_OVERHEAD: usize = 4;

/// Serial line speed expected by the scanner
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial device used when none is given
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Time between two packets
pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(2);

/// Tick count bound for one trigger; the pulse lasts `repeat + 1` ticks
pub const DEFAULT_REPEAT: u32 = 50;
