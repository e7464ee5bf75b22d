pub mod constants;
pub mod controller;
pub mod error;
pub mod packet;
pub mod scheduler;
pub mod task;
pub mod transport;

// Re-export the main types for easy access
pub use controller::Cdas;
pub use error::CdasError;
pub use packet::{MAX_PPU_PACKET, Mode, Packet, PacketType, Signal, Status, Voltages, ZERO_PACKET, construct_packet};
pub use scheduler::{Action, Actions, SchedulerConfig, SignalScheduler};
pub use transport::{SerialConfig, SerialTransport, Transport};
