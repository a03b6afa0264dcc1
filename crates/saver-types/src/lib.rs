use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Low,
}

impl Level {
    /// `true` for [`Level::High`].
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::High => write!(f, "high"),
            Level::Low => write!(f, "low"),
        }
    }
}

/// Direction a line is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "in"),
            Direction::Output => write!(f, "out"),
        }
    }
}

/// BCM line numbers wired to the power-saver board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    /// Enable line, held high while the supervisor is alive.
    pub output: u8,
    /// Power-presence sense line (high = power present).
    pub sense: u8,
}

impl PinAssignment {
    pub const DEFAULT_OUTPUT: u8 = 22;
    pub const DEFAULT_SENSE: u8 = 23;

    /// Reject assignments where both roles share one line.
    pub fn validate(&self) -> Result<(), SaverError> {
        if self.output == self.sense {
            return Err(SaverError::InvalidConfig(format!(
                "output and sense pins must differ (both are {})",
                self.output
            )));
        }
        Ok(())
    }
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            output: Self::DEFAULT_OUTPUT,
            sense: Self::DEFAULT_SENSE,
        }
    }
}

/// Error type shared by every crate in the workspace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaverError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pin Fault on GPIO {pin}: {details}")]
    PinFault { pin: u8, details: String },

    #[error("Shutdown hook failed: {0}")]
    HookFailure(String),

    #[error("Host shutdown could not be started: {0}")]
    HostShutdown(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl SaverError {
    /// Shorthand for building a [`SaverError::PinFault`].
    pub fn pin_fault(pin: u8, details: impl Into<String>) -> Self {
        SaverError::PinFault {
            pin,
            details: details.into(),
        }
    }
}
