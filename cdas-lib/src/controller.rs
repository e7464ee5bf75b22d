use crate::error::CdasError;
use crate::packet::{MAX_PPU_PACKET, ZERO_PACKET};
use crate::scheduler::{Action, Actions, SchedulerConfig, SignalScheduler};
use crate::transport::Transport;
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build an action that writes `frame` to `transport`
pub fn write_action<T: Transport>(transport: &Arc<Mutex<T>>, frame: Bytes) -> Action {
    let transport = Arc::clone(transport);
    Arc::new(move || {
        transport
            .lock()
            .map_err(|_| CdasError::TransportPoisoned)?
            .write_all(&frame)
    })
}

/// Trigger interface to the scanner's physiology unit.
///
/// Sends a 0 V packet every tick; [`Cdas::trigger`] replaces it with a full
/// scale PPU pulse for `repeat + 1` ticks.
///
/// Call [`Cdas::close`] when done: the tick thread is not stopped on drop and
/// keeps writing until the process exits.
pub struct Cdas<T: Transport> {
    transport: Arc<Mutex<T>>,
    scheduler: SignalScheduler,
}

impl<T: Transport> Cdas<T> {
    /// Default payloads and timing
    pub fn new(transport: T) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let actions = Actions::new(
            write_action(&transport, ZERO_PACKET.clone()),
            write_action(&transport, MAX_PPU_PACKET.clone()),
        );
        Self {
            transport,
            scheduler: SignalScheduler::with_defaults(actions),
        }
    }

    /// Custom baseline and pulse frames
    pub fn with_packets(
        transport: T,
        baseline: Bytes,
        pulse: Bytes,
        config: SchedulerConfig,
    ) -> Result<Self, CdasError> {
        let transport = Arc::new(Mutex::new(transport));
        let actions = Actions::new(write_action(&transport, baseline), write_action(&transport, pulse));
        Self::with_actions(transport, actions, config)
    }

    /// Arbitrary tick actions. Use [`write_action`] to build actions that
    /// write to the shared transport.
    pub fn with_actions(
        transport: Arc<Mutex<T>>,
        actions: Actions,
        config: SchedulerConfig,
    ) -> Result<Self, CdasError> {
        Ok(Self {
            transport,
            scheduler: SignalScheduler::new(actions, config)?,
        })
    }

    pub fn transport(&self) -> &Arc<Mutex<T>> {
        &self.transport
    }

    pub fn scheduler(&self) -> &SignalScheduler {
        &self.scheduler
    }

    fn lock_transport(&self) -> Result<MutexGuard<'_, T>, CdasError> {
        self.transport.lock().map_err(|_| CdasError::TransportPoisoned)
    }

    /// Open the transport and start sending the baseline. Safe to call again
    /// while open.
    pub fn open(&mut self) -> Result<(), CdasError> {
        {
            let mut transport = self.lock_transport()?;
            if !transport.is_open() {
                transport.open()?;
            }
        }

        if self.scheduler.start()? {
            let config = self.scheduler.config();
            info!(
                resolution = ?config.resolution,
                pulse = ?config.pulse_duration(),
                "Baseline transmission started"
            );
        } else {
            debug!("Transmission already running");
        }
        Ok(())
    }

    /// Send a pulse to the scanner. Does not block. A trigger during a pulse
    /// neither restarts nor extends it.
    pub fn trigger(&self) {
        if !self.scheduler.arm() {
            warn!("Trigger ignored: transmission not started, call open() first");
        }
    }

    /// Stop transmission and close the transport.
    ///
    /// Blocks for one tick resolution while the tick thread winds down. A
    /// later [`Cdas::open`] starts over with a cleared trigger state.
    pub fn close(&mut self) -> Result<(), CdasError> {
        if !self.scheduler.stop() {
            warn!("Tick thread did not finish within one resolution");
        }

        let mut transport = self.lock_transport()?;
        if transport.is_open() {
            transport.close()?;
            info!("Transmission closed");
        }
        Ok(())
    }

    /// Trigger once, then once more after each delay. For checking pulse
    /// timing on the scanner by hand.
    pub async fn test_with_delays(&self, delays: &[Duration]) {
        self.trigger();
        for (i, delay) in delays.iter().enumerate() {
            tokio::time::sleep(*delay).await;
            debug!(pulse = i + 2, "Triggering after {:?}", delay);
            self.trigger();
        }
    }
}

impl<T: Transport> std::fmt::Debug for Cdas<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cdas").field("scheduler", &self.scheduler).finish_non_exhaustive()
    }
}
