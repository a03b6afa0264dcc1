//! [`RpiPins`] – Raspberry Pi GPIO driver built on `rppal`.
//!
//! Pins are addressed by BCM number, so the same numbers work whatever base
//! the kernel assigns to the gpiochip.  The peripheral is opened lazily on
//! the first [`configure`][PinInterface::configure]; a board without GPIO
//! surfaces as a [`SaverError::PinFault`] on that pin.
//!
//! [`release_all`][PinInterface::release_all] drives outputs low before
//! dropping them.  Dropping an `rppal` pin restores its original mode.

use std::collections::BTreeMap;

use rppal::gpio::{self, Gpio, InputPin, OutputPin};
use saver_types::{Direction, Level, SaverError};
use tracing::debug;

use crate::pin::PinInterface;

/// GPIO driver for Raspberry Pi class boards.
#[derive(Default)]
pub struct RpiPins {
    gpio: Option<Gpio>,
    outputs: BTreeMap<u8, OutputPin>,
    inputs: BTreeMap<u8, InputPin>,
}

impl RpiPins {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&mut self, pin: u8) -> Result<Gpio, SaverError> {
        if let Some(gpio) = &self.gpio {
            return Ok(gpio.clone());
        }
        let gpio = Gpio::new()
            .map_err(|e| SaverError::pin_fault(pin, format!("failed to open GPIO: {e}")))?;
        self.gpio = Some(gpio.clone());
        Ok(gpio)
    }

    fn is_claimed(&self) -> bool {
        !self.outputs.is_empty() || !self.inputs.is_empty()
    }
}

pub(crate) fn to_rppal(level: Level) -> gpio::Level {
    match level {
        Level::High => gpio::Level::High,
        Level::Low => gpio::Level::Low,
    }
}

pub(crate) fn from_rppal(level: gpio::Level) -> Level {
    match level {
        gpio::Level::High => Level::High,
        gpio::Level::Low => Level::Low,
    }
}

impl PinInterface for RpiPins {
    fn configure(&mut self, pin: u8, direction: Direction) -> Result<(), SaverError> {
        let gpio = self.open(pin)?;
        // Reconfiguring hands the line back first.
        self.outputs.remove(&pin);
        self.inputs.remove(&pin);

        let line = gpio
            .get(pin)
            .map_err(|e| SaverError::pin_fault(pin, format!("failed to claim line: {e}")))?;
        match direction {
            Direction::Output => {
                self.outputs.insert(pin, line.into_output());
            }
            Direction::Input => {
                self.inputs.insert(pin, line.into_input());
            }
        }
        debug!(pin, %direction, "gpio configured");
        Ok(())
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), SaverError> {
        let line = self
            .outputs
            .get_mut(&pin)
            .ok_or_else(|| SaverError::pin_fault(pin, "not configured as an output"))?;
        line.write(to_rppal(level));
        Ok(())
    }

    fn read(&mut self, pin: u8) -> Result<Level, SaverError> {
        if let Some(line) = self.inputs.get(&pin) {
            return Ok(from_rppal(line.read()));
        }
        if let Some(line) = self.outputs.get(&pin) {
            return Ok(Level::from(line.is_set_high()));
        }
        Err(SaverError::pin_fault(pin, "not configured"))
    }

    fn release_all(&mut self) {
        if !self.is_claimed() {
            return;
        }
        for (pin, mut line) in std::mem::take(&mut self.outputs) {
            line.set_low();
            debug!(pin, "gpio released");
        }
        for (pin, _line) in std::mem::take(&mut self.inputs) {
            debug!(pin, "gpio released");
        }
    }
}

impl Drop for RpiPins {
    fn drop(&mut self) {
        self.release_all();
    }
}
