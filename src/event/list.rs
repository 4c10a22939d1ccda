use super::{
    Action, EventHandle, EventKey, EventKind, EventState, Priority, ScheduledEvent, MAX_PRIORITY,
    MIN_PRIORITY,
};
use crate::runtime::{Model, SimError};
use crate::time::SimTime;
use std::collections::BTreeMap;
use std::sync::Arc;

///
/// The pending-event queue of a simulator.
///
/// A balanced tree keyed by `(time, -priority, seq)`, which gives worst-case
/// `O(log n)` insertion, removal of the earliest event and cancellation by
/// handle. The insertion sequence is internal and strictly monotone.
///
pub(crate) struct EventList<M: Model> {
    map: BTreeMap<EventKey, ScheduledEvent<M>>,
    next_seq: u64,
}

impl<M: Model> EventList<M> {
    pub(crate) fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    ///
    /// Schedules a user event, validating the priority range and that the
    /// firing time does not lie in the simulation past.
    ///
    pub(crate) fn schedule(
        &mut self,
        now: SimTime,
        time: SimTime,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(SimError::PriorityOutOfRange(priority));
        }
        if time < now {
            return Err(SimError::ScheduleInPast { time, now });
        }
        Ok(self.insert(time, priority, EventKind::User(action)))
    }

    /// Inserts one of the kernel's control events, bypassing the user
    /// priority range.
    pub(crate) fn insert_control(
        &mut self,
        time: SimTime,
        priority: Priority,
        kind: EventKind<M>,
    ) -> EventHandle {
        self.insert(time, priority, kind)
    }

    fn insert(&mut self, time: SimTime, priority: Priority, kind: EventKind<M>) -> EventHandle {
        let key = EventKey {
            time,
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let event = ScheduledEvent::new(key, kind);
        let handle = event.handle();
        self.map.insert(key, event);
        handle
    }

    /// Peeks at the ordering key of the earliest pending event.
    pub(crate) fn first(&self) -> Option<EventKey> {
        self.map.keys().next().copied()
    }

    /// Removes and returns the earliest pending event.
    pub(crate) fn pop_first(&mut self) -> Option<ScheduledEvent<M>> {
        self.map.pop_first().map(|(_, event)| event)
    }

    ///
    /// Cancels the referenced event. Returns `true` iff the event was still
    /// pending in this list; cancelling an executed, cancelled or foreign
    /// event returns `false` without error.
    ///
    pub(crate) fn cancel(&mut self, handle: &EventHandle) -> bool {
        let Some(event) = self.map.get(&handle.key) else {
            return false;
        };
        // A key match is not enough: the handle could stem from another
        // simulator whose list assigned the same sequence numbers.
        if !Arc::ptr_eq(event.state_cell(), &handle.state) {
            return false;
        }
        let event = self
            .map
            .remove(&handle.key)
            .expect("event present under its own key");
        event.state_cell().set(EventState::Cancelled);
        true
    }

    ///
    /// Drops every pending event. None of them counts as executed; their
    /// handles report `Cancelled` from here on.
    ///
    pub(crate) fn clear(&mut self) {
        for event in self.map.values() {
            event.state_cell().set(EventState::Cancelled);
        }
        self.map.clear();
    }
}
