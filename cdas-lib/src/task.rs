//! Named background threads with cooperative cancellation.
//!
//! A task is a plain function receiving a [`StopSignal`]. It is expected to
//! check the signal regularly and return once it is set; nothing interrupts it
//! forcibly.

use crate::error::CdasError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Shared stop flag handed to a task
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to a task started with [`spawn`].
///
/// Dropping the handle detaches the thread; it keeps running until its
/// function returns.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

/// Start `task` on its own OS thread, named `name`
pub fn spawn<F>(name: &str, task: F) -> Result<TaskHandle, CdasError>
where
    F: FnOnce(StopSignal) + Send + 'static,
{
    let stop = StopSignal::default();
    let task_stop = stop.clone();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || task(task_stop))?;
    debug!(task = name, "Task spawned");

    Ok(TaskHandle {
        name: name.to_string(),
        stop,
        handle: Some(handle),
    })
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the task function has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Set the stop signal without waiting
    pub fn request_stop(&self) {
        self.stop.stop();
    }

    /// Signal the task, wait `grace`, then join it if it has returned.
    ///
    /// Returns `false` when the task was still busy after `grace`; the thread
    /// is detached in that case and finishes on its own.
    pub fn stop(mut self, grace: Duration) -> bool {
        self.request_stop();
        thread::sleep(grace);

        match self.handle.take() {
            Some(handle) if handle.is_finished() => {
                if handle.join().is_err() {
                    warn!(task = %self.name, "Task panicked before stopping");
                }
                debug!(task = %self.name, "Task joined");
                true
            }
            Some(_) => {
                warn!(
                    task = %self.name,
                    "Task still busy after {:?}, detaching it",
                    grace
                );
                false
            }
            None => true,
        }
    }
}
