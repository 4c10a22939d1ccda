use super::SimError;
use crate::naming::Context;
use crate::time::{Duration, SimTime};
use std::sync::Arc;

///
/// The boundaries of one simulation run.
///
/// A replication spans `[start_time, end_time]`; statistics begin
/// accumulating at `warmup_time`. It also carries the naming [`Context`]
/// under which observers bind themselves. After `initialize` the
/// replication is immutable for the duration of the run.
///
#[derive(Clone, Debug)]
pub struct Replication {
    start_time: SimTime,
    warmup_time: SimTime,
    end_time: SimTime,
    context: Arc<Context>,
}

impl Replication {
    ///
    /// Creates a replication with a fresh root context.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::InvalidReplication`] unless
    /// `start_time <= warmup_time <= end_time`.
    ///
    pub fn new(
        start_time: SimTime,
        warmup_time: SimTime,
        end_time: SimTime,
    ) -> Result<Self, SimError> {
        Self::with_context(start_time, warmup_time, end_time, Context::root())
    }

    ///
    /// Creates a replication bound to an existing context.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::InvalidReplication`] unless
    /// `start_time <= warmup_time <= end_time`.
    ///
    pub fn with_context(
        start_time: SimTime,
        warmup_time: SimTime,
        end_time: SimTime,
        context: Arc<Context>,
    ) -> Result<Self, SimError> {
        if !(start_time <= warmup_time && warmup_time <= end_time) {
            return Err(SimError::InvalidReplication);
        }
        Ok(Self {
            start_time,
            warmup_time,
            end_time,
            context,
        })
    }

    ///
    /// Creates a replication running from time zero for `run_length`,
    /// without a warmup period.
    ///
    #[must_use]
    pub fn from_run_length(run_length: Duration) -> Self {
        Self {
            start_time: SimTime::ZERO,
            warmup_time: SimTime::ZERO,
            end_time: SimTime::ZERO + run_length,
            context: Context::root(),
        }
    }

    /// The instant the simulation clock starts at.
    #[must_use]
    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    /// The instant at which statistics begin accumulating.
    #[must_use]
    pub fn warmup_time(&self) -> SimTime {
        self.warmup_time
    }

    /// The instant the replication ends at.
    #[must_use]
    pub fn end_time(&self) -> SimTime {
        self.end_time
    }

    /// The naming context of this run.
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_must_be_ordered() {
        assert!(Replication::new(SimTime::ZERO, SimTime::from(5.0), SimTime::from(10.0)).is_ok());
        assert!(matches!(
            Replication::new(SimTime::from(6.0), SimTime::from(5.0), SimTime::from(10.0)),
            Err(SimError::InvalidReplication)
        ));
        assert!(matches!(
            Replication::new(SimTime::ZERO, SimTime::from(11.0), SimTime::from(10.0)),
            Err(SimError::InvalidReplication)
        ));
    }

    #[test]
    fn run_length_replication_starts_at_zero() {
        let replication = Replication::from_run_length(Duration::from_secs(30));
        assert_eq!(replication.start_time(), SimTime::ZERO);
        assert_eq!(replication.warmup_time(), SimTime::ZERO);
        assert_eq!(replication.end_time(), SimTime::from(30.0));
    }
}
