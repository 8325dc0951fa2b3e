//! Activity indicator (status LED).
//!
//! Purely a liveness signal: nothing is ever read back from it.

pub trait Indicator {
    fn set(&mut self, on: bool);
    fn toggle(&mut self);
}

impl<T: Indicator + ?Sized> Indicator for &mut T {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }

    fn toggle(&mut self) {
        (**self).toggle()
    }
}
