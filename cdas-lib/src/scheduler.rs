//! Periodic signal generation.
//!
//! A single background thread ticks at a fixed resolution. On every tick it
//! runs either the baseline action or, while a trigger is armed, the triggered
//! action. One trigger keeps the triggered action running for `repeat + 1`
//! ticks, after which the arm flag clears itself.
//!
//! Wake-up times are absolute: each deadline is the previous deadline plus the
//! resolution, so time spent inside an action shortens the following sleep
//! instead of pushing every later tick back.

use crate::constants::{DEFAULT_REPEAT, DEFAULT_RESOLUTION};
use crate::error::CdasError;
use crate::task::{self, StopSignal, TaskHandle};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Thread name of the tick loop
pub const TICKER_NAME: &str = "cdas-ticker";

/// Work done on a tick. Errors are logged and the loop carries on.
pub type Action = Arc<dyn Fn() -> Result<(), CdasError> + Send + Sync>;

/// The two actions driven by the scheduler
#[derive(Clone)]
pub struct Actions {
    pub baseline: Action,
    pub triggered: Action,
}

impl Actions {
    pub fn new(baseline: Action, triggered: Action) -> Self {
        Self { baseline, triggered }
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actions").finish_non_exhaustive()
    }
}

/// Timing parameters of the tick loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// A trigger runs the triggered action on `repeat + 1` consecutive ticks
    pub repeat: u32,
    /// Tick period
    pub resolution: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            repeat: DEFAULT_REPEAT,
            resolution: DEFAULT_RESOLUTION,
        }
    }
}

impl SchedulerConfig {
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution;
        self
    }

    /// Wall time covered by one trigger. Saturates at `Duration::MAX` for
    /// configurations that `validate` rejects.
    pub fn pulse_duration(&self) -> Duration {
        self.resolution
            .checked_mul(self.repeat.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), CdasError> {
        if self.resolution.is_zero() {
            return Err(CdasError::InvalidConfig("tick resolution must be non-zero".to_string()));
        }
        if self.repeat == u32::MAX {
            return Err(CdasError::InvalidConfig(format!("repeat must be below {}", u32::MAX)));
        }
        if self.resolution.checked_mul(self.repeat + 1).is_none() {
            return Err(CdasError::InvalidConfig(format!(
                "pulse of {} ticks at {:?} overflows",
                self.repeat + 1,
                self.resolution
            )));
        }
        Ok(())
    }
}

/// Arm flag shared between the tick thread and whoever requests triggers
#[derive(Debug, Default)]
pub struct TriggerSignal {
    armed: AtomicBool,
}

impl TriggerSignal {
    /// Returns `true` if the signal was already armed
    pub fn arm(&self) -> bool {
        self.armed.swap(true, Ordering::AcqRel)
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}

/// What a tick runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Baseline,
    /// `first` marks the first tick of a countdown
    Triggered { first: bool },
}

/// Countdown owned by the tick loop
#[derive(Debug, Default)]
pub struct TriggerState {
    counter: u32,
}

impl TriggerState {
    /// Ticks spent in the current countdown
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Pick the phase of the next tick and advance the countdown.
    ///
    /// The arm flag is cleared once the counter exceeds `repeat`, so an armed
    /// signal yields `repeat + 1` triggered ticks.
    pub fn advance(&mut self, signal: &TriggerSignal, repeat: u32) -> Phase {
        if !signal.is_armed() {
            return Phase::Baseline;
        }

        let first = self.counter == 0;
        self.counter += 1;
        if self.counter > repeat {
            signal.disarm();
            self.counter = 0;
        }
        Phase::Triggered { first }
    }
}

/// Absolute-deadline pacing for a fixed period
#[derive(Debug, Clone)]
pub struct Pacer {
    next_wake: Instant,
    period: Duration,
}

impl Pacer {
    pub fn new(start: Instant, period: Duration) -> Self {
        Self {
            next_wake: start + period,
            period,
        }
    }

    pub fn next_wake(&self) -> Instant {
        self.next_wake
    }

    /// Sleep needed at `now` to reach the pending deadline; moves the deadline
    /// one period forward.
    pub fn next_sleep(&mut self, now: Instant) -> Duration {
        let sleep = self.next_wake.saturating_duration_since(now);
        self.next_wake += self.period;
        sleep
    }
}

/// Tick loop body. Runs until `stop` is set, checking it once per tick.
pub fn run_tick_loop(stop: &StopSignal, trigger: &TriggerSignal, config: SchedulerConfig, actions: &Actions) {
    let mut state = TriggerState::default();
    let mut pacer = Pacer::new(Instant::now(), config.resolution);
    let mut failing = false;
    let mut ticks: u64 = 0;

    debug!(
        repeat = config.repeat,
        resolution_us = config.resolution.as_micros() as u64,
        "Tick loop started"
    );

    while !stop.is_stopped() {
        let result = match state.advance(trigger, config.repeat) {
            Phase::Baseline => (actions.baseline)(),
            Phase::Triggered { first } => {
                if first {
                    info!("SCAN");
                }
                (actions.triggered)()
            }
        };

        match result {
            Ok(()) => failing = false,
            Err(e) if !failing => {
                warn!(tick = ticks, "Tick action failed: {e}");
                failing = true;
            }
            Err(e) => trace!(tick = ticks, "Tick action failed: {e}"),
        }

        ticks += 1;
        thread::sleep(pacer.next_sleep(Instant::now()));
    }

    debug!(ticks, "Tick loop stopped");
}

struct Run {
    trigger: Arc<TriggerSignal>,
    task: TaskHandle,
}

/// Owner of the tick loop.
///
/// The same instance can be started, stopped and started again; every start
/// gets a fresh arm flag and countdown.
pub struct SignalScheduler {
    config: SchedulerConfig,
    actions: Actions,
    run: Option<Run>,
}

impl SignalScheduler {
    pub fn new(actions: Actions, config: SchedulerConfig) -> Result<Self, CdasError> {
        config.validate()?;
        Ok(Self {
            config,
            actions,
            run: None,
        })
    }

    /// Scheduler with the default 2 ms resolution and repeat bound
    pub fn with_defaults(actions: Actions) -> Self {
        Self {
            config: SchedulerConfig::default(),
            actions,
            run: None,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    pub fn is_armed(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.trigger.is_armed())
    }

    /// Start the tick loop. Returns `false` if it was already running.
    pub fn start(&mut self) -> Result<bool, CdasError> {
        if self.is_running() {
            return Ok(false);
        }

        let trigger = Arc::new(TriggerSignal::default());
        let loop_trigger = Arc::clone(&trigger);
        let actions = self.actions.clone();
        let config = self.config;
        let task = task::spawn(TICKER_NAME, move |stop| {
            run_tick_loop(&stop, &loop_trigger, config, &actions)
        })?;

        self.run = Some(Run { trigger, task });
        Ok(true)
    }

    /// Request a pulse. Returns `false` if the loop is not running, in which
    /// case nothing happens.
    pub fn arm(&self) -> bool {
        match &self.run {
            Some(run) => {
                if run.trigger.arm() {
                    trace!("Trigger already armed");
                }
                true
            }
            None => false,
        }
    }

    /// Stop the tick loop, waiting one resolution for it to exit.
    ///
    /// Returns `false` if the loop was still inside an action afterwards.
    pub fn stop(&mut self) -> bool {
        match self.run.take() {
            Some(run) => {
                run.trigger.disarm();
                run.task.stop(self.config.resolution)
            }
            None => true,
        }
    }
}

impl fmt::Debug for SignalScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("armed", &self.is_armed())
            .finish()
    }
}
