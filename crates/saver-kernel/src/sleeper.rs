//! [`Sleeper`] – blocking wait used for the grace window and poll delay.

use std::time::Duration;

/// Blocks the calling thread for a duration.
pub trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

/// [`std::thread::sleep`] backed sleeper.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
