//! `saver-kernel` – Power-loss supervision
//!
//! Decides when the host must go down.  It does not talk to hardware directly;
//! every line is reached through an injected
//! [`PinInterface`][saver_hal::PinInterface].
//!
//! # Modules
//!
//! - [`supervisor`] – [`PowerSupervisor`][supervisor::PowerSupervisor]:
//!   validates configuration, claims the lines, and runs the debounce and
//!   commit protocol.
//! - [`supervisor_loop`] – [`SupervisorLoop`][supervisor_loop::SupervisorLoop]:
//!   polls the supervisor until a shutdown commits or a stop is requested.
//! - [`hook`] – [`ShutdownHook`][hook::ShutdownHook]: the user callback run
//!   right before commit.
//! - [`host`] – [`HostShutdown`][host::HostShutdown]: the irreversible host
//!   power-off action.
//! - [`sleeper`] – [`Sleeper`][sleeper::Sleeper]: the blocking wait used for
//!   the grace window.

pub mod hook;
pub mod host;
pub mod sleeper;
pub mod supervisor;
pub mod supervisor_loop;

pub use hook::{HookResult, NoopHook, ShutdownHook};
pub use host::{CommandShutdown, DryRunShutdown, HostShutdown};
pub use sleeper::{Sleeper, ThreadSleeper};
pub use supervisor::{PowerSupervisor, ShutdownOutcome, SupervisorConfig, SupervisorState};
pub use supervisor_loop::{LoopExit, SupervisorLoop};
