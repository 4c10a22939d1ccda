use super::{Model, Replication, SimError, EVENTLIST_CHANGED_EVENT};
use crate::bus::{BusEvent, EventBus, Payload};
use crate::event::{Action, EventHandle, EventList, Priority};
use crate::time::{Clock, Duration, SimTime};
use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;

///
/// The kernel view an event action executes against.
///
/// Actions run while the kernel lock is held; re-entering the kernel to
/// schedule, cancel or publish goes through this context, which keeps those
/// operations linearized with the run loop by construction.
///
pub struct SimContext<'a, M: Model> {
    /// The simulated model.
    pub model: &'a mut M,
    pub(crate) events: &'a mut EventList<M>,
    pub(crate) clock: &'a Clock,
    pub(crate) bus: &'a Arc<EventBus>,
    pub(crate) replication: &'a Replication,
    pub(crate) rng: &'a mut StdRng,
}

impl<'a, M: Model> SimContext<'a, M> {
    /// The current simulation time.
    #[must_use]
    pub fn sim_time(&self) -> SimTime {
        self.clock.now()
    }

    /// The boundaries of the current run.
    #[must_use]
    pub fn replication(&self) -> &Replication {
        self.replication
    }

    /// The number of pending events in the event list.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    ///
    /// Schedules an action at an absolute simulation time.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::ScheduleInPast`] if `time` lies before the
    /// current simulation time, or with [`SimError::PriorityOutOfRange`]
    /// for a priority outside the user range.
    ///
    pub fn schedule_event(
        &mut self,
        time: SimTime,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        let handle = self
            .events
            .schedule(self.clock.now(), time, priority, action)?;
        self.bus
            .publish(&BusEvent::new(&EVENTLIST_CHANGED_EVENT, Payload::Empty));
        Ok(handle)
    }

    ///
    /// Schedules an action `delay` after the current simulation time.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::TimeOverflow`] if `now + delay` is not
    /// representable, and with the errors of [`SimContext::schedule_event`].
    ///
    pub fn schedule_event_rel(
        &mut self,
        delay: Duration,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        let time = self.clock.now().try_add(delay)?;
        self.schedule_event(time, priority, action)
    }

    ///
    /// Schedules an action at the current instant. It fires after the events
    /// already popped, ordered among the not-yet-popped events at this
    /// instant by its priority and insertion order.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::PriorityOutOfRange`] for a priority outside
    /// the user range.
    ///
    pub fn schedule_event_now(
        &mut self,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        self.schedule_event(self.clock.now(), priority, action)
    }

    ///
    /// Cancels a pending event. Returns `true` iff the event was removed;
    /// cancelling an executed or cancelled event is a no-op.
    ///
    pub fn cancel_event(&mut self, handle: &EventHandle) -> bool {
        let cancelled = self.events.cancel(handle);
        if cancelled {
            self.bus
                .publish(&BusEvent::new(&EVENTLIST_CHANGED_EVENT, Payload::Empty));
        }
        cancelled
    }

    /// Publishes an event on the simulator's bus.
    pub fn publish(&self, event: &BusEvent) {
        self.bus.publish(event);
    }

    ///
    /// Returns a detachable handle onto this simulator, for collaborators
    /// that outlive the current event. Statistics observers keep it as
    /// their back-reference onto the simulator.
    ///
    #[must_use]
    pub fn observer_host(&self) -> SimHandle {
        SimHandle {
            clock: self.clock.clone(),
            bus: Arc::clone(self.bus),
            replication: self.replication.clone(),
        }
    }

    ///
    /// Generates a random instance of type T with a Standard distribution,
    /// drawn from the kernel's seedable RNG.
    ///
    #[must_use]
    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        self.rng.gen::<T>()
    }

    ///
    /// Generates a random instance of type T with a distribution of type D.
    ///
    pub fn sample<T, D>(&mut self, distr: D) -> T
    where
        D: Distribution<T>,
    {
        self.rng.sample::<T, D>(distr)
    }
}

///
/// A cloneable back-reference onto a simulator: the shared clock, the event
/// bus and the run boundaries. This is what statistics observers hold; it
/// is readable while the kernel dispatches events.
///
#[derive(Clone, Debug)]
pub struct SimHandle {
    clock: Clock,
    bus: Arc<EventBus>,
    replication: Replication,
}

impl SimHandle {
    /// The current simulation time.
    #[must_use]
    pub fn sim_time(&self) -> SimTime {
        self.clock.now()
    }

    /// The simulator's event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The boundaries of the current run.
    #[must_use]
    pub fn replication(&self) -> &Replication {
        &self.replication
    }

    /// The shared simulation clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
