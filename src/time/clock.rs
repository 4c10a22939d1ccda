use super::SimTime;
use std::sync::{Arc, RwLock};

///
/// A shared, readable handle onto the simulation clock.
///
/// The kernel is the only writer; the clock is stored outside the kernel
/// lock so that bus subscribers and statistics observers may read the
/// current time while an event is being dispatched.
///
#[derive(Clone, Debug, Default)]
pub struct Clock {
    inner: Arc<RwLock<SimTime>>,
}

impl Clock {
    pub(crate) fn new(start: SimTime) -> Self {
        Self {
            inner: Arc::new(RwLock::new(start)),
        }
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        *self.inner.read().expect("simulation clock poisoned")
    }

    /// Rebases the clock, used when a new replication is initialized.
    pub(crate) fn reset(&self, time: SimTime) {
        *self.inner.write().expect("simulation clock poisoned") = time;
    }

    /// Moves the clock forward. Never travels backwards.
    pub(crate) fn advance_to(&self, time: SimTime) {
        let mut now = self.inner.write().expect("simulation clock poisoned");
        if time > *now {
            *now = time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotone_under_advance() {
        let clock = Clock::new(SimTime::from(2.0));
        clock.advance_to(SimTime::from(1.0));
        assert_eq!(clock.now(), SimTime::from(2.0));
        clock.advance_to(SimTime::from(3.0));
        assert_eq!(clock.now(), SimTime::from(3.0));
    }
}
