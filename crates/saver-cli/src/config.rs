//! Daemon configuration – reads `/etc/apio-pi-saver/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::warn;

use saver_kernel::{HookResult, ShutdownHook, SupervisorConfig};
use saver_types::{PinAssignment, SaverError};

/// Default location of the config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/apio-pi-saver/config.toml";

/// Persisted daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Grace window in seconds before a power loss is confirmed.
    #[serde(default = "default_shutdown_time")]
    pub shutdown_time: f64,

    /// BCM number of the enable line.
    #[serde(default = "default_output_pin")]
    pub output_pin: u8,

    /// BCM number of the power-sense line.
    #[serde(default = "default_sense_pin")]
    pub sense_pin: u8,

    /// Delay between two samples of the sense line.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Command that powers the host off.
    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,

    /// Message printed by the pre-shutdown hook.
    #[serde(default = "default_hook_message")]
    pub hook_message: String,

    /// Optional shell command run by the pre-shutdown hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_command: Option<String>,
}

fn default_shutdown_time() -> f64 {
    1.0
}
fn default_output_pin() -> u8 {
    PinAssignment::DEFAULT_OUTPUT
}
fn default_sense_pin() -> u8 {
    PinAssignment::DEFAULT_SENSE
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_shutdown_command() -> String {
    saver_kernel::CommandShutdown::DEFAULT_COMMAND.to_string()
}
fn default_hook_message() -> String {
    "Shutting down Raspberry Pi...".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shutdown_time: default_shutdown_time(),
            output_pin: default_output_pin(),
            sense_pin: default_sense_pin(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_command: default_shutdown_command(),
            hook_message: default_hook_message(),
            hook_command: None,
        }
    }
}

impl Config {
    pub fn pins(&self) -> PinAssignment {
        PinAssignment {
            output: self.output_pin,
            sense: self.sense_pin,
        }
    }

    /// Validate and turn this file into a [`SupervisorConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::InvalidConfig`] for an out-of-range grace
    /// window or an empty hook command.
    pub fn to_supervisor_config(&self) -> Result<SupervisorConfig, SaverError> {
        if let Some(cmd) = &self.hook_command
            && cmd.trim().is_empty()
        {
            return Err(SaverError::InvalidConfig(
                "hook_command must not be empty".to_string(),
            ));
        }
        Ok(SupervisorConfig::new(self.shutdown_time, Some(self.build_hook()))?
            .with_pins(self.pins()))
    }

    /// Hook announcing the shutdown, then running `hook_command` if set.
    pub fn build_hook(&self) -> Box<dyn ShutdownHook> {
        let message = self.hook_message.clone();
        let command = self.hook_command.clone();
        Box::new(move || -> HookResult {
            println!("{}", message.yellow());
            if let Some(cmd) = &command {
                let status = Command::new("sh").arg("-c").arg(cmd).status()?;
                if !status.success() {
                    return Err(format!("hook command `{cmd}` exited with {status}").into());
                }
            }
            Ok(())
        })
    }
}

/// Resolve the config path: explicit override or [`DEFAULT_CONFIG_PATH`].
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
///
/// # Errors
///
/// - [`SaverError::Config`] if the file exists but cannot be read.
/// - [`SaverError::InvalidConfig`] if it does not parse (wrong value types
///   included).
pub fn load_from(path: &Path) -> Result<Option<Config>, SaverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SaverError::Config(format!("Failed to read config at {}: {}", path.display(), e))
    })?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| {
        SaverError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    Ok(Some(cfg))
}

/// Apply `APIO_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `APIO_SHUTDOWN_TIME` | `shutdown_time` |
/// | `APIO_OUTPUT_PIN` | `output_pin` |
/// | `APIO_SENSE_PIN` | `sense_pin` |
/// | `APIO_POLL_INTERVAL_MS` | `poll_interval_ms` |
/// | `APIO_SHUTDOWN_COMMAND` | `shutdown_command` |
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(v) = parsed_env("APIO_SHUTDOWN_TIME") {
        cfg.shutdown_time = v;
    }
    if let Some(v) = parsed_env("APIO_OUTPUT_PIN") {
        cfg.output_pin = v;
    }
    if let Some(v) = parsed_env("APIO_SENSE_PIN") {
        cfg.sense_pin = v;
    }
    if let Some(v) = parsed_env("APIO_POLL_INTERVAL_MS") {
        cfg.poll_interval_ms = v;
    }
    if let Ok(v) = std::env::var("APIO_SHUTDOWN_COMMAND") {
        cfg.shutdown_command = v;
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

/// Load `path` (defaults when absent) and apply env overrides.
pub fn load(path: &Path) -> Result<Config, SaverError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write config");
        (dir, path)
    }

    #[test]
    fn defaults_match_board_wiring() {
        let cfg = Config::default();
        assert_eq!(cfg.pins(), PinAssignment::default());
        assert!((cfg.shutdown_time - 1.0).abs() < f64::EPSILON);
        assert_eq!(cfg.shutdown_command, "shutdown -h now");
        assert!(cfg.hook_command.is_none());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("config.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let (_dir, path) = write_config("shutdown_time = 3\nsense_pin = 6\n");
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert!((cfg.shutdown_time - 3.0).abs() < f64::EPSILON);
        assert_eq!(cfg.sense_pin, 6);
        assert_eq!(cfg.output_pin, 22);
        assert_eq!(cfg.poll_interval_ms, 50);
    }

    #[test]
    fn roundtrip_through_toml() {
        let mut cfg = Config::default();
        cfg.hook_command = Some("sync".to_string());
        let (_dir, path) = write_config(&toml::to_string_pretty(&cfg).expect("serialize"));
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn non_numeric_shutdown_time_is_invalid() {
        let (_dir, path) = write_config("shutdown_time = \"soon\"\n");
        assert!(matches!(load_from(&path), Err(SaverError::InvalidConfig(_))));
    }

    #[test]
    fn non_callable_hook_is_invalid() {
        let (_dir, path) = write_config("hook_command = 42\n");
        assert!(matches!(load_from(&path), Err(SaverError::InvalidConfig(_))));
    }

    #[test]
    fn empty_hook_command_is_invalid() {
        let cfg = Config {
            hook_command: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            cfg.to_supervisor_config(),
            Err(SaverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_shutdown_time_is_invalid() {
        for t in [-1.0, 30.0] {
            let cfg = Config {
                shutdown_time: t,
                ..Config::default()
            };
            assert!(matches!(
                cfg.to_supervisor_config(),
                Err(SaverError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn supervisor_config_carries_pins_and_grace() {
        let cfg = Config {
            shutdown_time: 2.5,
            output_pin: 20,
            sense_pin: 6,
            ..Config::default()
        };
        let sup = cfg.to_supervisor_config().expect("valid");
        assert_eq!(sup.pins(), PinAssignment { output: 20, sense: 6 });
        assert!((sup.shutdown_time().as_secs_f64() - 2.5).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn hook_reports_failing_command() {
        let ok = Config {
            hook_command: Some("true".to_string()),
            ..Config::default()
        };
        assert!(ok.build_hook().invoke().is_ok());

        let failing = Config {
            hook_command: Some("exit 3".to_string()),
            ..Config::default()
        };
        assert!(failing.build_hook().invoke().is_err());
    }

    #[test]
    fn config_path_prefers_explicit() {
        assert_eq!(config_path(None), PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(
            config_path(Some(Path::new("/tmp/saver.toml"))),
            PathBuf::from("/tmp/saver.toml")
        );
    }

    #[test]
    fn apply_env_overrides_changes_shutdown_time() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("APIO_SHUTDOWN_TIME", "4.5") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!((cfg.shutdown_time - 4.5).abs() < f64::EPSILON);
        unsafe { std::env::remove_var("APIO_SHUTDOWN_TIME") };
    }

    #[test]
    fn apply_env_overrides_changes_sense_pin() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("APIO_SENSE_PIN", "17") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sense_pin, 17);
        unsafe { std::env::remove_var("APIO_SENSE_PIN") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_pin() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("APIO_OUTPUT_PIN", "not-a-pin") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.output_pin, PinAssignment::DEFAULT_OUTPUT);
        unsafe { std::env::remove_var("APIO_OUTPUT_PIN") };
    }

    #[test]
    fn apply_env_overrides_changes_shutdown_command() {
        // SAFETY: each env test touches its own variable.
        unsafe { std::env::set_var("APIO_SHUTDOWN_COMMAND", "poweroff") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.shutdown_command, "poweroff");
        unsafe { std::env::remove_var("APIO_SHUTDOWN_COMMAND") };
    }
}
