use anyhow::{Context, Result};
use cdas_lib::constants::{DEFAULT_PORT, DEFAULT_REPEAT};
use cdas_lib::{Cdas, MAX_PPU_PACKET, SchedulerConfig, SerialConfig, SerialTransport, ZERO_PACKET};
use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Send timed trigger pulses to a Philips MRI scanner through the CDAS PPU input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial device wired to the scanner's CDAS unit
    #[arg(default_value = DEFAULT_PORT)]
    port: String,

    /// Seconds to wait before each pulse after the first one
    delays: Vec<u64>,

    /// Number of delayed pulses when no delays are given
    #[arg(short, long, default_value_t = 100)]
    count: usize,

    /// Seconds between pulses when no delays are given
    #[arg(short, long, default_value_t = 2)]
    interval: u64,

    /// Pulse length in ticks, minus one
    #[arg(short, long, default_value_t = DEFAULT_REPEAT)]
    repeat: u32,

    /// Tick period in microseconds
    #[arg(long, default_value_t = 2000)]
    resolution_us: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn delays(&self) -> Vec<Duration> {
        if self.delays.is_empty() {
            vec![Duration::from_secs(self.interval); self.count]
        } else {
            self.delays.iter().copied().map(Duration::from_secs).collect()
        }
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_repeat(self.repeat)
            .with_resolution(Duration::from_micros(self.resolution_us))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    if let Err(e) = run(cli).await {
        error!("Trigger test failed: {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.scheduler_config();
    let delays = cli.delays();

    let transport = SerialTransport::new(SerialConfig::default().with_port(&cli.port));
    let mut cdas = Cdas::with_packets(transport, ZERO_PACKET.clone(), MAX_PPU_PACKET.clone(), config)
        .context("Invalid timing settings")?;
    cdas.open()
        .with_context(|| format!("Failed to open CDAS transmission on {}", cli.port))?;

    info!(
        port = %cli.port,
        pulses = delays.len() + 1,
        pulse_ms = config.pulse_duration().as_millis() as u64,
        "Starting trigger test (Ctrl+C to stop)"
    );

    tokio::select! {
        _ = cdas.test_with_delays(&delays) => {
            // let the last pulse run its course
            tokio::time::sleep(config.pulse_duration()).await;
            info!("Trigger test finished");
        }
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down gracefully.");
        }
    }

    cdas.close().context("Failed to close CDAS transmission")?;
    Ok(())
}
