//! [`PowerSupervisor`] – debounced power-loss detection and shutdown commit.
//!
//! The supervisor owns the enable (output) and sense (input) lines for its
//! whole lifetime.  A suspected power loss is held for the configured grace
//! window, then re-sampled exactly once:
//!
//! ```text
//!            check() == false
//!   Idle ───────────────────────► Suspected
//!    ▲                               │ sleep(shutdown_time)
//!    │   power back on re-check      │
//!    └───────────────────────────────┤
//!                                    │ still absent
//!                                    ▼
//!               hook → enable low → host shutdown ─► Committed
//! ```
//!
//! `Committed` is terminal.  Lines are released exactly once, either by an
//! explicit [`PowerSupervisor::close`] or when the supervisor is dropped.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use saver_hal::PinInterface;
use saver_types::{Direction, Level, PinAssignment, SaverError};
use tracing::{debug, error, info, warn};

use crate::hook::{NoopHook, ShutdownHook};
use crate::host::HostShutdown;
use crate::sleeper::{Sleeper, ThreadSleeper};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Validated supervisor configuration.
pub struct SupervisorConfig {
    shutdown_time: Duration,
    hook: Box<dyn ShutdownHook>,
    pins: PinAssignment,
}

impl SupervisorConfig {
    /// Upper bound (exclusive) of the grace window, in seconds.
    pub const MAX_SHUTDOWN_TIME_SECS: f64 = 30.0;

    /// Build a configuration from a grace window in seconds and an optional
    /// pre-shutdown hook.  A missing hook becomes a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::InvalidConfig`] unless `shutdown_time` is a
    /// finite number in `[0, 30)`.
    pub fn new(
        shutdown_time: f64,
        hook: Option<Box<dyn ShutdownHook>>,
    ) -> Result<Self, SaverError> {
        if !shutdown_time.is_finite() {
            return Err(SaverError::InvalidConfig(format!(
                "shutdown_time must be a number, got {shutdown_time}"
            )));
        }
        if !(0.0..Self::MAX_SHUTDOWN_TIME_SECS).contains(&shutdown_time) {
            return Err(SaverError::InvalidConfig(format!(
                "shutdown_time must be between 0 and 30 seconds, got {shutdown_time}"
            )));
        }
        Ok(Self {
            shutdown_time: Duration::from_secs_f64(shutdown_time),
            hook: hook.unwrap_or_else(|| Box::new(NoopHook)),
            pins: PinAssignment::default(),
        })
    }

    /// Replace the default BCM 22/23 wiring.
    pub fn with_pins(mut self, pins: PinAssignment) -> Self {
        self.pins = pins;
        self
    }

    pub fn shutdown_time(&self) -> Duration {
        self.shutdown_time
    }

    pub fn pins(&self) -> PinAssignment {
        self.pins
    }
}

impl std::fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("shutdown_time", &self.shutdown_time)
            .field("hook", &"<fn>")
            .field("pins", &self.pins)
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

/// Position of the supervisor in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Monitoring; no loss suspected.
    Idle,
    /// Loss suspected, grace window running.
    Suspected,
    /// Enable line dropped and host shutdown issued.  Terminal.
    Committed,
}

/// Result of one [`PowerSupervisor::shutdown`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Power came back during the grace window; monitoring resumes.
    Aborted,
    /// The host shutdown was issued.
    Committed,
}

// ────────────────────────────────────────────────────────────────────────────
// PowerSupervisor
// ────────────────────────────────────────────────────────────────────────────

/// Owns the power-saver lines and decides when the host must go down.
///
/// # Example
///
/// ```
/// use saver_hal::SimPins;
/// use saver_kernel::{DryRunShutdown, PowerSupervisor, SupervisorConfig};
/// use saver_types::Level;
///
/// let sim = SimPins::new();
/// sim.set_level(23, Level::High);
///
/// let config = SupervisorConfig::new(1.0, None).unwrap();
/// let mut supervisor =
///     PowerSupervisor::new(config, Box::new(sim.clone()), Box::new(DryRunShutdown)).unwrap();
///
/// assert!(supervisor.check().unwrap());
/// assert_eq!(sim.level(22), Level::High);
/// ```
pub struct PowerSupervisor {
    config: SupervisorConfig,
    pins: Box<dyn PinInterface>,
    host: Box<dyn HostShutdown>,
    sleeper: Box<dyn Sleeper>,
    state: SupervisorState,
    closed: bool,
}

impl PowerSupervisor {
    /// Claim the lines and assert the enable output.
    ///
    /// # Errors
    ///
    /// - [`SaverError::InvalidConfig`] if both roles share one line; no line
    ///   is touched in that case.
    /// - [`SaverError::PinFault`] if a line cannot be configured or driven.
    ///   Every line claimed so far is released before returning.
    pub fn new(
        config: SupervisorConfig,
        mut pins: Box<dyn PinInterface>,
        host: Box<dyn HostShutdown>,
    ) -> Result<Self, SaverError> {
        let assignment = config.pins;
        assignment.validate()?;

        if let Err(e) = claim_lines(pins.as_mut(), assignment) {
            pins.release_all();
            return Err(e);
        }

        info!(
            output_pin = assignment.output,
            sense_pin = assignment.sense,
            shutdown_time_secs = config.shutdown_time.as_secs_f64(),
            "power supervisor active"
        );

        Ok(Self {
            config,
            pins,
            host,
            sleeper: Box::new(ThreadSleeper),
            state: SupervisorState::Idle,
            closed: false,
        })
    }

    /// Replace the blocking sleeper used for the grace window.
    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// `true` while external power is present on the sense line.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::PinFault`] if the line cannot be read.
    pub fn check(&mut self) -> Result<bool, SaverError> {
        Ok(self.pins.read(self.config.pins.sense)?.is_high())
    }

    /// Run the confirm-and-commit protocol for a suspected power loss.
    ///
    /// Returns [`ShutdownOutcome::Aborted`] when power came back during the
    /// grace window.  Once committed, further calls do nothing.
    ///
    /// # Errors
    ///
    /// - [`SaverError::PinFault`] if the re-check cannot read the sense line
    ///   (nothing is committed), or if the enable line cannot be dropped (the
    ///   host shutdown is still issued first).
    /// - [`SaverError::HostShutdown`] if the shutdown action cannot start.
    pub fn shutdown(&mut self) -> Result<ShutdownOutcome, SaverError> {
        if self.state == SupervisorState::Committed {
            debug!("shutdown already committed");
            return Ok(ShutdownOutcome::Committed);
        }

        self.state = SupervisorState::Suspected;
        warn!(
            grace_secs = self.config.shutdown_time.as_secs_f64(),
            "power loss detected, shutting down"
        );
        self.sleeper.sleep(self.config.shutdown_time);

        match self.check() {
            Ok(true) => {
                self.state = SupervisorState::Idle;
                debug!("power restored during grace window");
                return Ok(ShutdownOutcome::Aborted);
            }
            Ok(false) => {}
            Err(e) => {
                self.state = SupervisorState::Idle;
                return Err(e);
            }
        }

        self.run_hook();

        let released = self.pins.write(self.config.pins.output, Level::Low);
        if let Err(e) = &released {
            error!(error = %e, "failed to drop enable line before host shutdown");
        }

        self.state = SupervisorState::Committed;
        self.host.initiate()?;
        released.map(|()| ShutdownOutcome::Committed)
    }

    /// Release every claimed line.  Only the first call has an effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pins.release_all();
        debug!("power supervisor lines released");
    }

    // Hook errors and panics stop here.
    fn run_hook(&mut self) {
        let hook = &mut self.config.hook;
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| hook.invoke())) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => SaverError::HookFailure(e.to_string()),
            Err(payload) => SaverError::HookFailure(panic_message(payload.as_ref())),
        };
        warn!(error = %failure, "shutdown hook failed; continuing");
    }
}

impl Drop for PowerSupervisor {
    fn drop(&mut self) {
        self.close();
    }
}

fn claim_lines(pins: &mut dyn PinInterface, assignment: PinAssignment) -> Result<(), SaverError> {
    pins.configure(assignment.output, Direction::Output)?;
    pins.configure(assignment.sense, Direction::Input)?;
    pins.write(assignment.output, Level::High)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "hook panicked".to_string()
    }
}
