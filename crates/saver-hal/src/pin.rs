//! Generic `PinInterface` trait for digital lines (power-sense inputs,
//! enable outputs, …).

use saver_types::{Direction, Level, SaverError};

/// Capability to configure, read, and write numbered digital lines.
///
/// A single instance is owned by exactly one
/// `PowerSupervisor`; implementations need not be shareable across threads.
pub trait PinInterface: Send {
    /// Configure `pin` for `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::PinFault`] if the line cannot be claimed.
    fn configure(&mut self, pin: u8, direction: Direction) -> Result<(), SaverError>;

    /// Drive an output line to `level`.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::PinFault`] if the line is not an output or the
    /// write fails.
    fn write(&mut self, pin: u8, level: Level) -> Result<(), SaverError>;

    /// Sample the current level of `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::PinFault`] on a failed read.
    fn read(&mut self, pin: u8) -> Result<Level, SaverError>;

    /// Release every line claimed through this instance.
    ///
    /// Must be idempotent: a second call has no further effect.
    fn release_all(&mut self);
}

impl<P: PinInterface + ?Sized> PinInterface for Box<P> {
    fn configure(&mut self, pin: u8, direction: Direction) -> Result<(), SaverError> {
        (**self).configure(pin, direction)
    }

    fn write(&mut self, pin: u8, level: Level) -> Result<(), SaverError> {
        (**self).write(pin, level)
    }

    fn read(&mut self, pin: u8) -> Result<Level, SaverError> {
        (**self).read(pin)
    }

    fn release_all(&mut self) {
        (**self).release_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockPins {
        levels: HashMap<u8, Level>,
        released: bool,
    }

    impl MockPins {
        fn new() -> Self {
            Self {
                levels: HashMap::new(),
                released: false,
            }
        }
    }

    impl PinInterface for MockPins {
        fn configure(&mut self, pin: u8, _direction: Direction) -> Result<(), SaverError> {
            self.levels.insert(pin, Level::Low);
            Ok(())
        }

        fn write(&mut self, pin: u8, level: Level) -> Result<(), SaverError> {
            match self.levels.get_mut(&pin) {
                Some(l) => {
                    *l = level;
                    Ok(())
                }
                None => Err(SaverError::pin_fault(pin, "not configured")),
            }
        }

        fn read(&mut self, pin: u8) -> Result<Level, SaverError> {
            self.levels
                .get(&pin)
                .copied()
                .ok_or_else(|| SaverError::pin_fault(pin, "not configured"))
        }

        fn release_all(&mut self) {
            self.levels.clear();
            self.released = true;
        }
    }

    #[test]
    fn mock_pins_write_then_read() {
        let mut pins = MockPins::new();
        pins.configure(22, Direction::Output).unwrap();
        pins.write(22, Level::High).unwrap();
        assert_eq!(pins.read(22).unwrap(), Level::High);
    }

    #[test]
    fn boxed_pins_forward_calls() {
        let mut pins: Box<dyn PinInterface> = Box::new(MockPins::new());
        pins.configure(22, Direction::Output).unwrap();
        pins.write(22, Level::Low).unwrap();
        assert_eq!(pins.read(22).unwrap(), Level::Low);
        assert!(pins.read(7).is_err());
        pins.release_all();
        assert!(pins.read(22).is_err());
    }
}
