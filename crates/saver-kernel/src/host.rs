//! [`HostShutdown`] – the irreversible host power-off action.

use std::process::{Command, Stdio};

use saver_types::SaverError;
use tracing::{info, warn};

/// Operation that takes the host down.
///
/// On success the process is expected to be terminated by the OS shortly
/// afterwards; callers must not rely on anything running after it.
pub trait HostShutdown: Send {
    /// # Errors
    ///
    /// Returns [`SaverError::HostShutdown`] if the action could not even be
    /// started.
    fn initiate(&mut self) -> Result<(), SaverError>;
}

impl<H: HostShutdown + ?Sized> HostShutdown for Box<H> {
    fn initiate(&mut self) -> Result<(), SaverError> {
        (**self).initiate()
    }
}

/// Runs an external command, `shutdown -h now` by default.
///
/// The child is spawned and not waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandShutdown {
    program: String,
    args: Vec<String>,
}

impl CommandShutdown {
    pub const DEFAULT_COMMAND: &'static str = "shutdown -h now";

    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::InvalidConfig`] for an empty command line.
    pub fn from_command_line(line: &str) -> Result<Self, SaverError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            SaverError::InvalidConfig("shutdown command must not be empty".to_string())
        })?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandShutdown {
    fn default() -> Self {
        Self::new("shutdown", vec!["-h".to_string(), "now".to_string()])
    }
}

impl HostShutdown for CommandShutdown {
    fn initiate(&mut self) -> Result<(), SaverError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| SaverError::HostShutdown(format!("{}: {e}", self.program)))?;
        info!(pid = child.id(), command = %self.program, "host shutdown started");
        Ok(())
    }
}

/// Logs instead of powering off.  Used for simulated and dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunShutdown;

impl HostShutdown for DryRunShutdown {
    fn initiate(&mut self) -> Result<(), SaverError> {
        warn!("dry run: host shutdown skipped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_is_halt_now() {
        let cmd = CommandShutdown::default();
        assert_eq!(cmd, CommandShutdown::from_command_line(CommandShutdown::DEFAULT_COMMAND).unwrap());
        assert_eq!(cmd.program(), "shutdown");
        assert_eq!(cmd.args(), ["-h", "now"]);
    }

    #[test]
    fn empty_command_line_is_invalid() {
        assert!(matches!(
            CommandShutdown::from_command_line("   "),
            Err(SaverError::InvalidConfig(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn spawns_command() {
        let mut cmd = CommandShutdown::from_command_line("true").unwrap();
        assert!(cmd.initiate().is_ok());
    }

    #[test]
    fn missing_program_is_reported() {
        let mut cmd = CommandShutdown::new("definitely-not-a-real-shutdown-binary", vec![]);
        assert!(matches!(cmd.initiate(), Err(SaverError::HostShutdown(_))));
    }

    #[test]
    fn dry_run_succeeds() {
        assert!(DryRunShutdown.initiate().is_ok());
    }
}
