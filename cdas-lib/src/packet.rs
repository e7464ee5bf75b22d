//! # CDAS trigger packet codec
//!
//! Every packet sent to the scanner's physiology unit has the layout
//!
//! ```text
//! [SOM][              DATA              ][CKSUM][EOM]
//!      [ID][Vx][Vy][Vz][PPU][RESP][STATUS]
//! ```
//!
//! - `SOM` and `EOM` are `0x02` and `0x0D`.
//! - `ID` selects the channels present in DATA (see [`PacketType`]). `Vx` and
//!   `Vy` are always present.
//! - Each voltage takes two bytes with bit 7 set, carrying 14 bits of a two's
//!   complement value (high 7 bits first).
//! - `STATUS` is `S<signal>0<mode>\n` (see [`Status`]).
//! - `CKSUM` is the XOR of DATA. When it lands on a reserved byte (SOM, EOM,
//!   XON or XOFF) its one's complement is sent instead.

use crate::constants::{
    EOM, FRAME_OVERHEAD, INT14_MAX, INT14_MIN, RESERVED_BYTES, SOM, STATUS_SIZE, VOLTAGE_BITS_MASK,
    VOLTAGE_MARKER, VOLTAGE_SIZE,
};
use crate::error::CdasError;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::sync::LazyLock;
use strum_macros::Display;

/// Packet ID byte. Determines which voltage channels follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PacketType {
    #[strum(to_string = "ECG X/Y")]
    Xy = 0x80,
    #[strum(to_string = "ECG X/Y/Z")]
    Xyz = 0x81,
    #[strum(to_string = "ECG X/Y + PPU + RESP")]
    XyPpuResp = 0x82,
    #[strum(to_string = "ECG X/Y/Z + PPU + RESP")]
    XyzPpuResp = 0x83,
}

impl Default for PacketType {
    fn default() -> Self {
        PacketType::XyPpuResp
    }
}

impl PacketType {
    pub fn has_ecg_z(self) -> bool {
        matches!(self, PacketType::Xyz | PacketType::XyzPpuResp)
    }

    pub fn has_ppu_resp(self) -> bool {
        matches!(self, PacketType::XyPpuResp | PacketType::XyzPpuResp)
    }

    /// Number of voltage channels carried by this packet type
    pub fn channel_count(self) -> usize {
        2 + usize::from(self.has_ecg_z()) + 2 * usize::from(self.has_ppu_resp())
    }

    /// Total frame length for a status string of `status_len` bytes
    pub fn frame_len(self, status_len: usize) -> usize {
        FRAME_OVERHEAD + VOLTAGE_SIZE * self.channel_count() + status_len
    }
}

/// Voltage readings for all five channels.
///
/// Only the channels selected by the [`PacketType`] go on the wire. Values
/// must fit a 14-bit two's complement integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Voltages {
    pub ecg_x: i32,
    pub ecg_y: i32,
    pub ecg_z: i32,
    pub ppu: i32,
    pub resp: i32,
}

impl Voltages {
    /// All channels at 0 V except PPU
    pub fn ppu(ppu: i32) -> Self {
        Self { ppu, ..Self::default() }
    }

    /// Channel values in wire order for `kind`
    pub fn channels(&self, kind: PacketType) -> Vec<i32> {
        let mut vals = vec![self.ecg_x, self.ecg_y];
        if kind.has_ecg_z() {
            vals.push(self.ecg_z);
        }
        if kind.has_ppu_resp() {
            vals.extend([self.ppu, self.resp]);
        }
        vals
    }

    /// Inverse of [`Voltages::channels`]. Channels absent from `kind` read as 0.
    fn from_channels(kind: PacketType, vals: &[i32]) -> Self {
        let mut it = vals.iter().copied();
        let mut next = || it.next().unwrap_or(0);
        let ecg_x = next();
        let ecg_y = next();
        let ecg_z = if kind.has_ecg_z() { next() } else { 0 };
        let (ppu, resp) = if kind.has_ppu_resp() { (next(), next()) } else { (0, 0) };
        Self {
            ecg_x,
            ecg_y,
            ecg_z,
            ppu,
            resp,
        }
    }
}

/// Signal field of the status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Signal {
    #[strum(to_string = "ECG")]
    Ecg = b'V',
    #[strum(to_string = "PPU")]
    Ppu = b'S',
    #[strum(to_string = "RESP")]
    Resp = b'R',
    #[strum(to_string = "nurse call")]
    NurseCall = b'C',
    #[strum(to_string = "MEB")]
    Meb = b'M',
}

/// Mode field of the status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Mode {
    #[strum(to_string = "normal")]
    Normal = b'0',
    #[strum(to_string = "connected")]
    Connected = b'1',
    #[strum(to_string = "active")]
    Active = b'3',
}

/// Typed form of the `S<signal>0<mode>\n` status string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub signal: Signal,
    pub mode: Mode,
}

impl Status {
    pub const ECG_NORMAL: Status = Status::new(Signal::Ecg, Mode::Normal);
    pub const ECG_CONNECTED: Status = Status::new(Signal::Ecg, Mode::Connected);
    pub const ECG_ACTIVE: Status = Status::new(Signal::Ecg, Mode::Active);
    pub const PPU_NORMAL: Status = Status::new(Signal::Ppu, Mode::Normal);
    pub const PPU_CONNECTED: Status = Status::new(Signal::Ppu, Mode::Connected);
    pub const PPU_ACTIVE: Status = Status::new(Signal::Ppu, Mode::Active);
    pub const RESP_NORMAL: Status = Status::new(Signal::Resp, Mode::Normal);
    pub const RESP_CONNECTED: Status = Status::new(Signal::Resp, Mode::Connected);
    pub const RESP_ACTIVE: Status = Status::new(Signal::Resp, Mode::Active);

    pub const fn new(signal: Signal, mode: Mode) -> Self {
        Self { signal, mode }
    }

    pub fn to_bytes(self) -> [u8; STATUS_SIZE] {
        [b'S', self.signal.into(), b'0', self.mode.into(), b'\n']
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::RESP_ACTIVE
    }
}

impl TryFrom<&[u8]> for Status {
    type Error = CdasError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let [b'S', signal, b'0', mode, b'\n'] = bytes else {
            return Err(CdasError::InvalidPacket(format!(
                "status {:02x?} is not of the form S?0?\\n",
                bytes
            )));
        };
        let signal = Signal::try_from(*signal)
            .map_err(|e| CdasError::InvalidPacket(format!("unknown status signal 0x{:02x}", e.number)))?;
        let mode = Mode::try_from(*mode)
            .map_err(|e| CdasError::InvalidPacket(format!("unknown status mode 0x{:02x}", e.number)))?;
        Ok(Status { signal, mode })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.signal, self.mode)
    }
}

/// Encode a 14-bit integer in two bytes whose high bit is set
pub fn encode_voltage(value: i32) -> Result<[u8; VOLTAGE_SIZE], CdasError> {
    if !(INT14_MIN..=INT14_MAX).contains(&value) {
        return Err(CdasError::VoltageOutOfRange { value });
    }
    Ok(encode_voltage_in_range(value))
}

fn encode_voltage_in_range(value: i32) -> [u8; VOLTAGE_SIZE] {
    [
        VOLTAGE_MARKER | ((value >> 7) as u8 & VOLTAGE_BITS_MASK),
        VOLTAGE_MARKER | (value as u8 & VOLTAGE_BITS_MASK),
    ]
}

/// Decode a voltage produced by [`encode_voltage`]
pub fn decode_voltage(bytes: [u8; VOLTAGE_SIZE]) -> Result<i32, CdasError> {
    if bytes.iter().any(|b| b & VOLTAGE_MARKER == 0) {
        return Err(CdasError::InvalidPacket(format!(
            "voltage bytes {:02x?} lack the marker bit",
            bytes
        )));
    }
    let raw = (i32::from(bytes[0] & VOLTAGE_BITS_MASK) << 7) | i32::from(bytes[1] & VOLTAGE_BITS_MASK);
    // sign-extend bit 13
    Ok(if raw & 0x2000 != 0 { raw - 0x4000 } else { raw })
}

/// XOR of all bytes, complemented if the result is a reserved byte
pub fn compute_checksum(data: &[u8]) -> u8 {
    let cksum = data.iter().fold(0u8, |acc, b| acc ^ b);
    if RESERVED_BYTES.contains(&cksum) { !cksum } else { cksum }
}

/// Build a framed packet ready to be written to the serial line.
///
/// Fails if a voltage is outside the 14-bit range or the status contains a
/// reserved framing byte.
pub fn construct_packet(kind: PacketType, voltages: &Voltages, status: &[u8]) -> Result<Bytes, CdasError> {
    for value in voltages.channels(kind) {
        encode_voltage(value)?;
    }
    if let Some(index) = status.iter().position(|b| RESERVED_BYTES.contains(b)) {
        return Err(CdasError::ReservedStatusByte {
            byte: status[index],
            index,
        });
    }
    Ok(build_frame(kind, voltages, status))
}

/// Framing for inputs that are already known to be valid
fn build_frame(kind: PacketType, voltages: &Voltages, status: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(kind.frame_len(status.len()));
    frame.put_u8(SOM);
    frame.put_u8(kind.into());
    for value in voltages.channels(kind) {
        frame.put_slice(&encode_voltage_in_range(value));
    }
    frame.put_slice(status);
    let cksum = compute_checksum(&frame[1..]);
    frame.put_u8(cksum);
    frame.put_u8(EOM);
    frame.freeze()
}

/// All channels at 0 V, RESP active. Default baseline payload.
pub static ZERO_PACKET: LazyLock<Bytes> =
    LazyLock::new(|| build_frame(PacketType::XyPpuResp, &Voltages::default(), &Status::RESP_ACTIVE.to_bytes()));

/// PPU at full scale, RESP active. Default trigger payload.
pub static MAX_PPU_PACKET: LazyLock<Bytes> = LazyLock::new(|| {
    build_frame(
        PacketType::XyPpuResp,
        &Voltages::ppu(INT14_MAX),
        &Status::RESP_ACTIVE.to_bytes(),
    )
});

/// Decoded form of a trigger packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub voltages: Voltages,
    pub status: Bytes,
}

impl Packet {
    pub fn new(kind: PacketType, voltages: Voltages, status: Status) -> Self {
        Self {
            kind,
            voltages,
            status: Bytes::copy_from_slice(&status.to_bytes()),
        }
    }

    /// Framed bytes for this packet
    pub fn encode(&self) -> Result<Bytes, CdasError> {
        construct_packet(self.kind, &self.voltages, &self.status)
    }

    /// Typed status, if the status bytes follow the standard layout
    pub fn status(&self) -> Option<Status> {
        Status::try_from(self.status.as_ref()).ok()
    }
}

impl TryFrom<Bytes> for Packet {
    type Error = CdasError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < FRAME_OVERHEAD {
            return Err(CdasError::InvalidPacket(format!(
                "frame too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != SOM {
            return Err(CdasError::InvalidPacket(format!(
                "expected SOM 0x{SOM:02x}, got 0x{:02x}",
                bytes[0]
            )));
        }
        let last = bytes[bytes.len() - 1];
        if last != EOM {
            return Err(CdasError::InvalidPacket(format!(
                "expected EOM 0x{EOM:02x}, got 0x{last:02x}"
            )));
        }

        let kind = PacketType::try_from(bytes[1]).map_err(|e| CdasError::UnknownPacketType(e.number))?;
        let cksum_at = bytes.len() - 2;
        let channels_end = 2 + VOLTAGE_SIZE * kind.channel_count();
        if channels_end > cksum_at {
            return Err(CdasError::InvalidPacket(format!(
                "frame too short for {kind}: {} bytes",
                bytes.len()
            )));
        }

        let expected = compute_checksum(&bytes[1..cksum_at]);
        let actual = bytes[cksum_at];
        if expected != actual {
            return Err(CdasError::ChecksumMismatch { expected, actual });
        }

        let vals = bytes[2..channels_end]
            .chunks_exact(VOLTAGE_SIZE)
            .map(|pair| decode_voltage([pair[0], pair[1]]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Packet {
            kind,
            voltages: Voltages::from_channels(kind, &vals),
            status: bytes.slice(channels_end..cksum_at),
        })
    }
}
