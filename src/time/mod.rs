//!
//! Temporal quantification in a simulation context.
//!
//! A [`SimTime`] is an absolute instant on the logical simulation clock,
//! measured as a [`Duration`] since time zero. The clock only moves when the
//! kernel executes an event, so two reads between events always agree.
//!
//! # Examples
//!
//! ```rust
//! # use descore::time::*;
//! let t = SimTime::ZERO + Duration::from_secs(5);
//! assert_eq!(t, SimTime::from(5.0));
//! assert!(t < t + Duration::from_nanos(1));
//! ```

mod clock;
pub use clock::Clock;

use crate::runtime::SimError;
use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign};

/// A Duration type to represent a span of time.
pub use std::time::Duration;

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(Duration);

impl SimTime {
    /// The smallest representable simulation time, equal to time zero.
    pub const MIN: SimTime = SimTime(Duration::ZERO);
    /// The greatest representable simulation time.
    pub const MAX: SimTime = SimTime(Duration::MAX);
    /// The start of the simulation time scale.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    ///
    /// Constructs an instance of `SimTime` from a given duration since [`SimTime::ZERO`].
    ///
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    ///
    /// Checked addition of a duration onto this instant.
    /// Returns `None` should the addition overflow the representation.
    ///
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }

    ///
    /// Fallible addition of a duration onto this instant, for call sites
    /// that propagate with `?`.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::TimeOverflow`] should the addition overflow
    /// the representation.
    ///
    pub fn try_add(self, duration: Duration) -> Result<SimTime, SimError> {
        self.checked_add(duration).ok_or(SimError::TimeOverflow)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    ///
    /// # Panics
    ///
    /// Panics if `earlier` is later than `self`.
    #[must_use]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier)
            .expect("supplied instant is later than self")
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or `None` if that instant is later than this one.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    #[must_use]
    pub fn saturating_duration_since(&self, earlier: SimTime) -> Duration {
        self.checked_duration_since(earlier).unwrap_or_default()
    }

    ///
    /// Represents this instant as seconds since time zero.
    ///
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        self.checked_add(rhs)
            .expect("overflow when adding Duration to SimTime")
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

// f64 shorthands, interpreted as seconds.

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: f64) -> Self::Output {
        self + Duration::from_secs_f64(rhs)
    }
}

impl AddAssign<f64> for SimTime {
    fn add_assign(&mut self, rhs: f64) {
        *self = *self + rhs;
    }
}

impl From<f64> for SimTime {
    fn from(secs: f64) -> Self {
        SimTime(Duration::from_secs_f64(secs))
    }
}

impl From<SimTime> for Duration {
    fn from(time: SimTime) -> Self {
        time.0
    }
}

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simtime_ordering_and_arithmetic() {
        let a = SimTime::from(1.0);
        let b = a + Duration::from_millis(500);
        assert!(a < b);
        assert_eq!(b.duration_since(a), Duration::from_millis(500));
        assert_eq!(a.saturating_duration_since(b), Duration::ZERO);
    }

    #[test]
    fn simtime_checked_add_overflows() {
        assert!(SimTime::MAX.checked_add(Duration::from_nanos(1)).is_none());
        assert_eq!(
            SimTime::ZERO.checked_add(Duration::from_secs(1)),
            Some(SimTime::from(1.0))
        );
    }

    #[test]
    fn simtime_try_add_reports_overflow() {
        assert!(matches!(
            SimTime::MAX.try_add(Duration::from_nanos(1)),
            Err(SimError::TimeOverflow)
        ));
        assert_eq!(
            SimTime::ZERO.try_add(Duration::from_secs(2)).unwrap(),
            SimTime::from(2.0)
        );
    }
}
