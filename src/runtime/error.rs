use super::RunState;
use crate::event::{Priority, MAX_PRIORITY, MIN_PRIORITY};
use crate::time::SimTime;
use std::error::Error;
use thiserror::Error;

///
/// An error raised by the simulation kernel or one of its collaborators.
///
#[derive(Debug, Error)]
pub enum SimError {
    /// The operation is not permitted in the current run state,
    /// e.g. `initialize` while the simulator is running.
    #[error("operation not permitted in run state {0:?}")]
    IllegalState(RunState),

    /// The requested firing time lies in the simulation past.
    #[error("cannot schedule an event at {time}, the clock is already at {now}")]
    ScheduleInPast {
        /// The requested firing time.
        time: SimTime,
        /// The simulation time at the moment of scheduling.
        now: SimTime,
    },

    /// The event's bound action has already been consumed.
    #[error("event has already been executed")]
    AlreadyExecuted,

    /// Time arithmetic overflowed the representation.
    #[error("arithmetic overflow on the simulation time scale")]
    TimeOverflow,

    /// The priority lies outside the range available to user events.
    #[error("priority {0} lies outside the user range {MIN_PRIORITY}..={MAX_PRIORITY}")]
    PriorityOutOfRange(Priority),

    /// The name is already bound in the target context. Observers treat
    /// this as non-fatal and only log it.
    #[error("cannot bind `{0}`: name already bound in context")]
    BindingFailure(String),

    /// The replication bounds are not ordered.
    #[error("replication bounds must satisfy start <= warmup <= end")]
    InvalidReplication,

    /// `Model::construct_model` failed during `initialize`.
    #[error("model construction failed")]
    ConstructFailed(#[source] Box<dyn Error + Send + Sync>),

    /// A global tracing subscriber is already installed.
    #[error("failed to install the simulation logger")]
    LoggerInstall(#[source] Box<dyn Error + Send + Sync>),
}

///
/// How the kernel reacts to an event action that returns an error.
///
/// The strategy only governs faults raised *by event actions* during the
/// run loop; scheduling and lifecycle errors are always returned to the
/// caller directly.
///
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Log the fault and keep executing events.
    LogAndContinue,
    /// Log a warning and pause the run; `start` resumes it.
    #[default]
    WarnAndPause,
    /// Log a warning and end the replication.
    WarnAndEnd,
}
