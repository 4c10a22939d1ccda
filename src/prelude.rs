//!
//! A collection of commonly used items, ready for import.
//!

pub use crate::bus::{
    BusEvent, EventBus, EventType, NotifyResult, Payload, Subscriber, SubscriberId, SubscriberRef,
};
pub use crate::event::{
    Action, ActionResult, EventHandle, EventState, Priority, MAX_PRIORITY, MIN_PRIORITY,
    NORMAL_PRIORITY,
};
pub use crate::naming::Context;
pub use crate::runtime::{
    Builder, ErrorStrategy, Model, Replication, RunState, SimContext, SimError, SimHandle,
    Simulator, END_REPLICATION_EVENT, EVENTLIST_CHANGED_EVENT, START_EVENT, STOP_EVENT,
    TIME_CHANGED_EVENT, WARMUP_EVENT,
};
pub use crate::stats::{
    Counter, Observer, Persistent, Statistic, StatisticsSet, Tally, TIMED_INITIALIZED_EVENT,
    TIMED_OBSERVATION_ADDED_EVENT,
};
pub use crate::time::{Clock, Duration, SimTime};
pub use crate::SimLogger;
