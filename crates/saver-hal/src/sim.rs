//! In-process simulated pin bank for CI/CD testing without physical hardware.
//!
//! [`SimPins`] implements [`PinInterface`] over shared in-memory state.  The
//! handle is cheap to clone: give one clone to the supervisor and keep another
//! to script sense levels and inspect what was driven.
//!
//! # Stub behaviour
//!
//! | Operation | Stub behaviour |
//! |---|---|
//! | `configure` | Records the direction; fails if a configure fault was injected for that pin. |
//! | `write` | Records the level; fails unless the pin is configured as an output (or a write fault was injected). |
//! | `read` | Pops the next scripted level for the pin, otherwise returns its steady level (default low). |
//! | `release_all` | Forgets all directions; only the first call after a claim is recorded. |
//!
//! # Example
//!
//! ```rust
//! use saver_hal::sim::SimPins;
//! use saver_hal::PinInterface;
//! use saver_types::{Direction, Level};
//!
//! let sim = SimPins::new();
//! sim.set_level(23, Level::High);
//!
//! let mut pins = sim.clone();
//! pins.configure(23, Direction::Input).unwrap();
//! assert_eq!(pins.read(23).unwrap(), Level::High);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use saver_types::{Direction, Level, SaverError};
use tracing::trace;

use crate::pin::PinInterface;

/// One recorded call against a [`SimPins`] bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOp {
    Configure(u8, Direction),
    Write(u8, Level),
    Read(u8),
    ReleaseAll,
}

#[derive(Default)]
struct SimState {
    directions: HashMap<u8, Direction>,
    steady: HashMap<u8, Level>,
    scripted: HashMap<u8, VecDeque<Level>>,
    ops: Vec<PinOp>,
    fail_configure: Option<u8>,
    fail_reads: bool,
    fail_writes: bool,
}

/// Shared-state simulated GPIO bank.
#[derive(Clone, Default)]
pub struct SimPins {
    state: Arc<Mutex<SimState>>,
}

impl SimPins {
    /// Create an empty bank with every line low and unclaimed.
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock only happens inside a failing test; keep
    // serving the state so the remaining assertions still report.
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the level returned by reads once the script for `pin` is exhausted.
    pub fn set_level(&self, pin: u8, level: Level) {
        self.lock().steady.insert(pin, level);
    }

    /// Queue levels returned by the next reads of `pin`, in order.
    pub fn script(&self, pin: u8, levels: impl IntoIterator<Item = Level>) {
        self.lock()
            .scripted
            .entry(pin)
            .or_default()
            .extend(levels);
    }

    /// Make every subsequent read fail with a pin fault.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every subsequent write fail with a pin fault.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make configuring `pin` fail with a pin fault.
    pub fn fail_configure(&self, pin: u8) {
        self.lock().fail_configure = Some(pin);
    }

    /// Every call recorded so far.
    pub fn ops(&self) -> Vec<PinOp> {
        self.lock().ops.clone()
    }

    /// Levels written to `pin`, in order.
    pub fn writes(&self, pin: u8) -> Vec<Level> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                PinOp::Write(p, level) if *p == pin => Some(*level),
                _ => None,
            })
            .collect()
    }

    /// Number of effective `release_all` calls.
    pub fn release_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, PinOp::ReleaseAll))
            .count()
    }

    /// Current direction of `pin`, `None` when unclaimed.
    pub fn direction(&self, pin: u8) -> Option<Direction> {
        self.lock().directions.get(&pin).copied()
    }

    /// Last level driven or set on `pin` (low when never touched).
    pub fn level(&self, pin: u8) -> Level {
        self.lock().steady.get(&pin).copied().unwrap_or(Level::Low)
    }
}

impl PinInterface for SimPins {
    fn configure(&mut self, pin: u8, direction: Direction) -> Result<(), SaverError> {
        let mut state = self.lock();
        state.ops.push(PinOp::Configure(pin, direction));
        if state.fail_configure == Some(pin) {
            return Err(SaverError::pin_fault(pin, "simulated configure fault"));
        }
        state.directions.insert(pin, direction);
        trace!(pin, %direction, "sim pin configured");
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), SaverError> {
        let mut state = self.lock();
        state.ops.push(PinOp::Write(pin, level));
        if state.fail_writes {
            return Err(SaverError::pin_fault(pin, "simulated write fault"));
        }
        match state.directions.get(&pin) {
            Some(Direction::Output) => {
                state.steady.insert(pin, level);
                Ok(())
            }
            _ => Err(SaverError::pin_fault(pin, "pin is not configured as an output")),
        }
    }

    fn read(&mut self, pin: u8) -> Result<Level, SaverError> {
        let mut state = self.lock();
        state.ops.push(PinOp::Read(pin));
        if state.fail_reads {
            return Err(SaverError::pin_fault(pin, "simulated read fault"));
        }
        if !state.directions.contains_key(&pin) {
            return Err(SaverError::pin_fault(pin, "pin is not configured"));
        }
        if let Some(level) = state.scripted.get_mut(&pin).and_then(VecDeque::pop_front) {
            return Ok(level);
        }
        Ok(state.steady.get(&pin).copied().unwrap_or(Level::Low))
    }

    fn release_all(&mut self) {
        let mut state = self.lock();
        if state.directions.is_empty() {
            return;
        }
        state.directions.clear();
        state.ops.push(PinOp::ReleaseAll);
        trace!("sim pins released");
    }
}
