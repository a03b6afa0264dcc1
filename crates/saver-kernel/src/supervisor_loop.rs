//! [`SupervisorLoop`] – drives a [`PowerSupervisor`] until the host goes down
//! or a stop is requested.
//!
//! The stop flag is only observed between iterations.  A stop raised while a
//! grace window is running does not cancel it; the re-check at the end of the
//! window decides the outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use saver_types::SaverError;
use tracing::{debug, info};

use crate::supervisor::{PowerSupervisor, ShutdownOutcome};

/// Why [`SupervisorLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A shutdown was committed; the host is going down.
    Committed,
    /// The stop flag was raised.
    Stopped,
}

/// Polling loop around a [`PowerSupervisor`].
pub struct SupervisorLoop {
    supervisor: PowerSupervisor,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl SupervisorLoop {
    /// Busy-poll `supervisor` with no delay between samples.
    pub fn new(supervisor: PowerSupervisor) -> Self {
        Self {
            supervisor,
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval: Duration::ZERO,
        }
    }

    /// Use an externally owned stop flag (e.g. one set by a signal handler).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Sleep `interval` between samples.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Handle that requests the loop to stop when set to `true`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    #[cfg(test)]
    pub(crate) fn supervisor(&self) -> &PowerSupervisor {
        &self.supervisor
    }

    /// Poll until a shutdown commits or a stop is requested.
    ///
    /// # Errors
    ///
    /// Propagates any [`SaverError`] from the supervisor.  Pin faults are not
    /// retried.
    pub fn run(&mut self) -> Result<LoopExit, SaverError> {
        info!(poll_interval = ?self.poll_interval, "monitoring power");
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("stop requested; leaving monitoring loop");
                return Ok(LoopExit::Stopped);
            }

            if !self.supervisor.check()? {
                match self.supervisor.shutdown()? {
                    ShutdownOutcome::Committed => return Ok(LoopExit::Committed),
                    ShutdownOutcome::Aborted => debug!("resuming monitoring"),
                }
            }

            if !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }
    }

    /// Run the loop, then release the lines whatever the outcome.
    pub fn run_to_completion(mut self) -> Result<LoopExit, SaverError> {
        let result = self.run();
        self.supervisor.close();
        result
    }
}
