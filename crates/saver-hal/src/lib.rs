//! `saver-hal` – GPIO access for the power supervisor.
//!
//! # Modules
//!
//! - [`pin`] – the [`PinInterface`][pin::PinInterface] trait every driver
//!   implements.  The supervisor only ever talks to this trait.
//! - `rpi` – `RpiPins`: `rppal` driver used on real boards.  Only built
//!   with the `hardware-gpio` feature.
//! - [`sim`] – [`SimPins`][sim::SimPins]: in-process pin bank for tests and
//!   hardware-free runs.

pub mod pin;
#[cfg(feature = "hardware-gpio")]
pub mod rpi;
pub mod sim;

pub use pin::PinInterface;
#[cfg(feature = "hardware-gpio")]
pub use rpi::RpiPins;
pub use sim::{PinOp, SimPins};
