//!
//! Scheduled events, their ordering and their cancellation handles.
//!

use crate::runtime::{Model, SimContext, SimError};
use crate::time::SimTime;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, Ordering as MemOrdering};
use std::sync::Arc;

mod list;
pub(crate) use list::EventList;

///
/// The tie-breaker between events scheduled at the same instant.
/// Higher priorities fire first.
///
pub type Priority = i16;

/// The lowest priority a user event may carry.
pub const MIN_PRIORITY: Priority = 1;
/// The highest priority a user event may carry.
pub const MAX_PRIORITY: Priority = 10;
/// The default priority of scheduled events.
pub const NORMAL_PRIORITY: Priority = (MIN_PRIORITY + MAX_PRIORITY) / 2;

// Reserved for the kernel's control events. The warmup event must precede,
// and the end-replication event must follow, every user event scheduled at
// the same instant.
pub(crate) const WARMUP_PRIORITY: Priority = MAX_PRIORITY + 1;
pub(crate) const END_PRIORITY: Priority = MIN_PRIORITY - 1;

///
/// The result of an executed event action.
///
pub type ActionResult = Result<(), Box<dyn Error + Send + Sync>>;

///
/// The invocable payload of a scheduled event.
///
/// An action is a bound closure that executes against the kernel through a
/// [`SimContext`], so it may schedule or cancel further events, publish bus
/// events and mutate the model. It runs at most once.
///
pub struct Action<M: Model> {
    f: Box<dyn FnOnce(&mut SimContext<'_, M>) -> ActionResult + Send>,
}

impl<M: Model> Action<M> {
    ///
    /// Creates an action from a bound closure.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let action = Action::call(|ctx| {
    ///     ctx.model.arrivals += 1;
    ///     Ok(())
    /// });
    /// ```
    ///
    pub fn call<F>(f: F) -> Self
    where
        F: FnOnce(&mut SimContext<'_, M>) -> ActionResult + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub(crate) fn invoke(self, ctx: &mut SimContext<'_, M>) -> ActionResult {
        (self.f)(ctx)
    }
}

impl<M: Model> Debug for Action<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Action(..)")
    }
}

///
/// The lifecycle state of a scheduled event.
///
/// An event is held by the event list if and only if it is `Pending`.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EventState {
    /// The event sits in the event list, waiting to fire.
    Pending = 0,
    /// The event has been popped and its action consumed.
    Executed = 1,
    /// The event was removed before firing and will never execute.
    Cancelled = 2,
}

/// Shared between the queued event and every issued handle,
/// so cancellation state is readable without the kernel lock.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(EventState::Pending as u8))
    }

    pub(crate) fn get(&self) -> EventState {
        match self.0.load(MemOrdering::SeqCst) {
            0 => EventState::Pending,
            1 => EventState::Executed,
            _ => EventState::Cancelled,
        }
    }

    pub(crate) fn set(&self, state: EventState) {
        self.0.store(state as u8, MemOrdering::SeqCst);
    }
}

///
/// The ordering key of a scheduled event.
///
/// Events are ordered by ascending time, then by descending priority, then
/// by ascending insertion sequence, which makes the order among equal
/// `(time, priority)` pairs FIFO.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct EventKey {
    pub(crate) time: SimTime,
    pub(crate) priority: Priority,
    pub(crate) seq: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

///
/// A token for a scheduled event, usable with `cancel_event`.
///
/// Handles stay valid after the event fired or was cancelled; cancelling a
/// non-pending event is a no-op that returns `false`.
///
#[derive(Clone, Debug)]
pub struct EventHandle {
    pub(crate) key: EventKey,
    pub(crate) state: Arc<StateCell>,
}

impl EventHandle {
    /// The absolute instant the event was scheduled for.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.key.time
    }

    /// The priority the event was scheduled with.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.key.priority
    }

    /// The current lifecycle state of the event.
    #[must_use]
    pub fn state(&self) -> EventState {
        self.state.get()
    }
}

/// What a popped event does when it fires.
pub(crate) enum EventKind<M: Model> {
    User(Action<M>),
    Warmup,
    EndReplication,
}

///
/// A deferred invocation with an absolute firing time and a priority.
///
pub(crate) struct ScheduledEvent<M: Model> {
    key: EventKey,
    state: Arc<StateCell>,
    kind: Option<EventKind<M>>,
}

impl<M: Model> ScheduledEvent<M> {
    pub(crate) fn new(key: EventKey, kind: EventKind<M>) -> Self {
        Self {
            key,
            state: Arc::new(StateCell::new()),
            kind: Some(kind),
        }
    }

    pub(crate) fn key(&self) -> EventKey {
        self.key
    }

    pub(crate) fn time(&self) -> SimTime {
        self.key.time
    }

    pub(crate) fn state_cell(&self) -> &Arc<StateCell> {
        &self.state
    }

    pub(crate) fn handle(&self) -> EventHandle {
        EventHandle {
            key: self.key,
            state: Arc::clone(&self.state),
        }
    }

    ///
    /// Consumes the bound action for execution, exactly once.
    /// A second attempt fails with [`SimError::AlreadyExecuted`].
    ///
    pub(crate) fn fire(&mut self) -> Result<EventKind<M>, SimError> {
        match self.state.get() {
            EventState::Pending => {
                let kind = self.kind.take().expect("pending event without an action");
                self.state.set(EventState::Executed);
                Ok(kind)
            }
            _ => Err(SimError::AlreadyExecuted),
        }
    }
}

impl<M: Model> Debug for ScheduledEvent<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("time", &self.key.time)
            .field("priority", &self.key.priority)
            .field("seq", &self.key.seq)
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::NullModel;

    #[test]
    fn key_orders_time_priority_seq() {
        let a = EventKey {
            time: SimTime::from(1.0),
            priority: NORMAL_PRIORITY,
            seq: 7,
        };
        let later = EventKey {
            time: SimTime::from(2.0),
            priority: MAX_PRIORITY,
            seq: 0,
        };
        let urgent = EventKey {
            time: SimTime::from(1.0),
            priority: NORMAL_PRIORITY + 1,
            seq: 8,
        };
        let fifo = EventKey { seq: 8, ..a };

        assert!(a < later);
        assert!(urgent < a);
        assert!(a < fifo);
    }

    #[test]
    fn event_fires_exactly_once() {
        let key = EventKey {
            time: SimTime::ZERO,
            priority: NORMAL_PRIORITY,
            seq: 0,
        };
        let mut event: ScheduledEvent<NullModel> =
            ScheduledEvent::new(key, EventKind::User(Action::call(|_| Ok(()))));

        assert!(event.fire().is_ok());
        assert_eq!(event.state_cell().get(), EventState::Executed);
        assert!(matches!(event.fire(), Err(SimError::AlreadyExecuted)));
    }
}
