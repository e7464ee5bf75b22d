use anyhow::{Context, Result};
use bytes::Bytes;
use cdas_lib::{MAX_PPU_PACKET, Mode, Packet, PacketType, Signal, Status, Voltages, ZERO_PACKET, construct_packet};
use clap::{Parser, ValueEnum};

/// Build a CDAS trigger packet and print it in hex, followed by its decoded form.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Channel layout
    #[arg(short, long, value_enum, default_value_t = Kind::XyPpuResp)]
    kind: Kind,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    ecg_x: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    ecg_y: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    ecg_z: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    ppu: i32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    resp: i32,

    /// Status signal
    #[arg(short, long, value_enum, default_value_t = SignalArg::Resp)]
    signal: SignalArg,

    /// Status mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::Active)]
    mode: ModeArg,

    /// Print the built-in baseline and pulse packets instead
    #[arg(long)]
    canonical: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Xy,
    Xyz,
    XyPpuResp,
    XyzPpuResp,
}

impl From<Kind> for PacketType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Xy => PacketType::Xy,
            Kind::Xyz => PacketType::Xyz,
            Kind::XyPpuResp => PacketType::XyPpuResp,
            Kind::XyzPpuResp => PacketType::XyzPpuResp,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SignalArg {
    Ecg,
    Ppu,
    Resp,
    NurseCall,
    Meb,
}

impl From<SignalArg> for Signal {
    fn from(signal: SignalArg) -> Self {
        match signal {
            SignalArg::Ecg => Signal::Ecg,
            SignalArg::Ppu => Signal::Ppu,
            SignalArg::Resp => Signal::Resp,
            SignalArg::NurseCall => Signal::NurseCall,
            SignalArg::Meb => Signal::Meb,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Normal,
    Connected,
    Active,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => Mode::Normal,
            ModeArg::Connected => Mode::Connected,
            ModeArg::Active => Mode::Active,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.canonical {
        print_frame("baseline", &ZERO_PACKET)?;
        print_frame("pulse", &MAX_PPU_PACKET)?;
        return Ok(());
    }

    let frame = build_frame(&args)?;
    print_frame("packet", &frame)
}

fn build_frame(args: &Args) -> Result<Bytes> {
    let voltages = Voltages {
        ecg_x: args.ecg_x,
        ecg_y: args.ecg_y,
        ecg_z: args.ecg_z,
        ppu: args.ppu,
        resp: args.resp,
    };
    let status = Status::new(args.signal.into(), args.mode.into());
    construct_packet(args.kind.into(), &voltages, &status.to_bytes()).context("Cannot build packet")
}

fn print_frame(label: &str, frame: &Bytes) -> Result<()> {
    let packet = Packet::try_from(frame.clone()).context("Built frame failed to decode")?;
    let v = packet.voltages;
    println!("{label}: {}", hex::encode(frame));
    println!("  type:     0x{:02x} ({})", u8::from(packet.kind), packet.kind);
    println!("  length:   {} bytes", frame.len());
    println!(
        "  voltages: x={} y={} z={} ppu={} resp={}",
        v.ecg_x, v.ecg_y, v.ecg_z, v.ppu, v.resp
    );
    match packet.status() {
        Some(status) => println!("  status:   {status}"),
        None => println!("  status:   {:02x?}", packet.status.as_ref()),
    }
    println!("  checksum: 0x{:02x}", frame[frame.len() - 2]);
    Ok(())
}
