//! `apio-pi-saver` – power-loss shutdown daemon
//!
//! This binary is the process entry point.  It:
//!
//! 1. Refuses to start unless running as root (GPIO and `shutdown` both
//!    need it).  `--simulate` skips the check.
//! 2. Loads `/etc/apio-pi-saver/config.toml` (or `--config`), applying
//!    `APIO_*` environment overrides.
//! 3. Claims the enable and sense lines and polls for power loss until the
//!    host is shut down.
//! 4. Intercepts **Ctrl-C** / SIGTERM to stop polling and release the lines.

mod config;
mod privilege;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tracing::{error, info, warn};

use saver_hal::{PinInterface, RpiPins, SimPins};
use saver_kernel::{
    CommandShutdown, DryRunShutdown, HostShutdown, LoopExit, PowerSupervisor, SupervisorLoop,
};
use saver_types::{Level, SaverError};

/// Shut a Raspberry Pi down cleanly when the Apio Pi Saver reports power loss.
#[derive(Debug, Parser)]
#[command(name = "apio-pi-saver", version, about)]
struct Cli {
    /// Config file path.
    #[arg(long, env = "APIO_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use an in-process pin bank instead of the board's GPIO (implies --dry-run).
    #[arg(long)]
    simulate: bool,

    /// With --simulate, drop the sense line after this many seconds.
    #[arg(long, value_name = "SECS", requires = "simulate")]
    simulate_loss_after: Option<f64>,

    /// Log instead of running the shutdown command.
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); APIO_LOG_FORMAT=json
    // switches to newline-delimited JSON for journald / log shippers.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("APIO_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    let cli = Cli::parse();

    // ── Privilege check ───────────────────────────────────────────────────
    if !cli.simulate && !cli.print_config && !privilege::is_root() {
        eprintln!(
            "{} {}{}{}",
            "ERROR:".red().bold(),
            "You ".yellow(),
            "must".yellow().underline(),
            " start this program with root permissions!!".yellow()
        );
        return ExitCode::FAILURE;
    }

    if cli.print_config {
        return match print_config(&cli) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {}", "Config error".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    match run(&cli) {
        Ok(LoopExit::Committed) => {
            info!("host shutdown issued");
            ExitCode::SUCCESS
        }
        Ok(LoopExit::Stopped) => {
            println!("{}", "  ✓ Lines released. Exiting.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "power supervisor stopped");
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

fn run(cli: &Cli) -> Result<LoopExit, SaverError> {
    let path = config::config_path(cli.config.as_deref());
    let cfg = config::load(&path)?;
    info!(path = %path.display(), ?cfg, "configuration loaded");

    // Must be in place before any line is claimed.
    let stop = Arc::new(AtomicBool::new(false));
    install_stop_handler(stop.clone());

    let pins = build_pins(cli, &cfg);
    let host = build_host(cli, &cfg)?;

    let supervisor = build_supervisor(&cfg, pins, host)?;
    let pins = supervisor.config().pins();
    info!(
        enable = pins.output,
        sense = pins.sense,
        grace = ?supervisor.config().shutdown_time(),
        "lines claimed"
    );
    let supervisor_loop = SupervisorLoop::new(supervisor)
        .with_stop_flag(stop)
        .with_poll_interval(Duration::from_millis(cfg.poll_interval_ms));

    println!("{}", "Starting...".green().bold());
    supervisor_loop.run_to_completion()
}

fn print_config(cli: &Cli) -> Result<(), SaverError> {
    let cfg = config::load(&config::config_path(cli.config.as_deref()))?;
    let raw = toml::to_string_pretty(&cfg)
        .map_err(|e| SaverError::Config(format!("Failed to serialize config: {e}")))?;
    print!("{raw}");
    Ok(())
}

/// Validate `cfg` and only then hand `pins` to a new supervisor.  An invalid
/// configuration leaves every line untouched.
fn build_supervisor(
    cfg: &config::Config,
    pins: Box<dyn PinInterface>,
    host: Box<dyn HostShutdown>,
) -> Result<PowerSupervisor, SaverError> {
    let supervisor_config = cfg.to_supervisor_config()?;
    PowerSupervisor::new(supervisor_config, pins, host)
}

fn build_pins(cli: &Cli, cfg: &config::Config) -> Box<dyn PinInterface> {
    if !cli.simulate {
        return Box::new(RpiPins::new());
    }

    let sim = SimPins::new();
    sim.set_level(cfg.sense_pin, Level::High);
    if let Some(secs) = cli.simulate_loss_after {
        let handle = sim.clone();
        let sense = cfg.sense_pin;
        let delay = Duration::try_from_secs_f64(secs).unwrap_or_default();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            warn!(pin = sense, "simulated power loss");
            handle.set_level(sense, Level::Low);
        });
    }
    Box::new(sim)
}

fn build_host(cli: &Cli, cfg: &config::Config) -> Result<Box<dyn HostShutdown>, SaverError> {
    if cli.simulate || cli.dry_run {
        return Ok(Box::new(DryRunShutdown));
    }
    Ok(Box::new(CommandShutdown::from_command_line(&cfg.shutdown_command)?))
}

fn install_stop_handler(stop: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Interrupted – releasing lines …".yellow().bold());
        stop.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; interruption will not release the lines");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saver_hal::PinOp;
    use saver_kernel::SupervisorState;
    use saver_types::Direction;

    fn sim_bank() -> SimPins {
        let sim = SimPins::new();
        sim.set_level(23, Level::High);
        sim
    }

    #[test]
    fn invalid_shutdown_time_never_touches_the_pins() {
        for shutdown_time in [-1.0, 30.0, f64::NAN, f64::INFINITY] {
            let sim = sim_bank();
            let cfg = config::Config {
                shutdown_time,
                ..config::Config::default()
            };

            let result = build_supervisor(&cfg, Box::new(sim.clone()), Box::new(DryRunShutdown));

            assert!(matches!(result, Err(SaverError::InvalidConfig(_))));
            assert!(sim.ops().is_empty(), "pins touched for {shutdown_time}");
            assert_eq!(sim.release_count(), 0);
        }
    }

    #[test]
    fn shared_pin_assignment_never_touches_the_pins() {
        let sim = sim_bank();
        let cfg = config::Config {
            output_pin: 23,
            sense_pin: 23,
            ..config::Config::default()
        };

        let result = build_supervisor(&cfg, Box::new(sim.clone()), Box::new(DryRunShutdown));

        assert!(matches!(result, Err(SaverError::InvalidConfig(_))));
        assert!(sim.ops().is_empty());
    }

    #[test]
    fn valid_config_claims_the_configured_lines() {
        let sim = sim_bank();
        let cfg = config::Config::default();

        let supervisor =
            build_supervisor(&cfg, Box::new(sim.clone()), Box::new(DryRunShutdown)).unwrap();

        assert_eq!(supervisor.state(), SupervisorState::Idle);
        assert_eq!(supervisor.config().pins(), cfg.pins());
        assert_eq!(
            supervisor.config().shutdown_time(),
            Duration::from_secs_f64(cfg.shutdown_time)
        );
        let ops = sim.ops();
        assert!(ops.contains(&PinOp::Configure(22, Direction::Output)));
        assert!(ops.contains(&PinOp::Configure(23, Direction::Input)));
        assert_eq!(sim.writes(22), vec![Level::High]);
    }
}
