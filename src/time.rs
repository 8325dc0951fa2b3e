//! Monotonic time source for the sequencing driver.

use embassy_time::Instant;

/// Monotonic clock.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// The Embassy time driver (RTC1 on target).
#[cfg(feature = "embedded")]
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "embedded")]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
