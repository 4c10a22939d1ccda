//!
//! Central primitives for running a discrete event simulation.
//!
//! The [`Simulator`] owns the pending-event list and the logical clock. It
//! advances time by repeatedly executing the earliest pending event, between
//! the boundaries of a [`Replication`], and publishes its lifecycle on the
//! event bus so that observers can follow the run without holding a
//! reference into the kernel.
//!

use crate::bus::{BusEvent, EventBus, EventType, Payload};
use crate::event::{
    Action, EventHandle, EventKind, EventList, Priority, END_PRIORITY, WARMUP_PRIORITY,
};
use crate::stats::StatisticsSet;
use crate::time::{Clock, Duration, SimTime};
use rand::rngs::StdRng;
use std::error::Error;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

mod builder;
pub use builder::Builder;

mod ctx;
pub use ctx::{SimContext, SimHandle};

mod error;
pub use error::{ErrorStrategy, SimError};

mod replication;
pub use replication::Replication;

/// Published whenever the simulation clock is about to advance; stamped
/// with the new time.
pub static TIME_CHANGED_EVENT: EventType = EventType::new("TIME_CHANGED_EVENT");
/// Published when the warmup instant of the replication is reached.
pub static WARMUP_EVENT: EventType = EventType::new("WARMUP_EVENT");
/// Published when the replication ends and the event list is cleared.
pub static END_REPLICATION_EVENT: EventType = EventType::new("END_REPLICATION_EVENT");
/// Published whenever the content of the event list changes.
pub static EVENTLIST_CHANGED_EVENT: EventType = EventType::new("EVENTLIST_CHANGED_EVENT");
/// Published when a run (or a single step) starts executing events.
pub static START_EVENT: EventType = EventType::new("START_EVENT");
/// Published when a run stops executing events.
pub static STOP_EVENT: EventType = EventType::new("STOP_EVENT");

///
/// The lifecycle state of a simulator.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Created, no replication bound yet.
    Initial,
    /// A replication is bound and the control events are scheduled.
    Initialized,
    /// A run is starting up.
    Starting,
    /// The run loop is executing events.
    Started,
    /// A stop was requested; the kernel stops between two events.
    Stopping,
    /// The run is paused and may be resumed with `start`.
    Stopped,
    /// The replication has ended; only `initialize` is meaningful now.
    Ended,
}

///
/// A simulated system, driven by the kernel.
///
/// `construct_model` is called exactly once during `initialize`; it is the
/// place to schedule initial events and to create statistics observers.
///
pub trait Model: Send + Sized + 'static {
    ///
    /// Builds the model for a fresh replication.
    ///
    /// # Errors
    ///
    /// A failure aborts `initialize` and leaves the simulator uninitialized.
    ///
    fn construct_model(ctx: &mut SimContext<'_, Self>) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// The collection owning this model's statistics observers.
    fn output_statistics(&mut self) -> &mut StatisticsSet;
}

///
/// The central management point for a discrete event simulation.
///
/// All public operations serialize on an internal kernel lock; event
/// actions execute while it is held and re-enter the kernel through the
/// [`SimContext`] passed to them. Bus subscribers are notified on the
/// simulation thread and must not call back into the simulator — they
/// observe it through [`SimHandle`] instead.
///
pub struct Simulator<M: Model> {
    kernel: Mutex<Kernel<M>>,
    clock: Clock,
    bus: Arc<EventBus>,
}

struct Kernel<M: Model> {
    model: M,
    events: EventList<M>,
    state: RunState,
    replication: Option<Replication>,
    strategy: ErrorStrategy,
    rng: StdRng,
    event_count: usize,
}

impl<M: Model> Simulator<M> {
    ///
    /// Creates a simulator with default options. See [`Builder`] for
    /// seeding and error-strategy configuration.
    ///
    #[must_use]
    pub fn new(model: M) -> Self {
        Builder::new().build(model)
    }

    pub(crate) fn assemble(model: M, rng: StdRng, strategy: ErrorStrategy) -> Self {
        Self {
            kernel: Mutex::new(Kernel {
                model,
                events: EventList::new(),
                state: RunState::Initial,
                replication: None,
                strategy,
                rng,
                event_count: 0,
            }),
            clock: Clock::new(SimTime::ZERO),
            bus: Arc::new(EventBus::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Kernel<M>> {
        self.kernel.lock().expect("simulation kernel poisoned")
    }

    fn notify_eventlist_changed(&self) {
        self.bus
            .publish(&BusEvent::new(&EVENTLIST_CHANGED_EVENT, Payload::Empty));
    }

    ///
    /// Binds a replication and prepares a fresh run: the event list is
    /// cleared, the clock rebased to `start_time`, the warmup and
    /// end-replication control events are scheduled and the model is
    /// constructed.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::IllegalState`] while a run is executing, and
    /// with [`SimError::ConstructFailed`] when the model cannot be built.
    ///
    pub fn initialize(&self, replication: Replication) -> Result<(), SimError> {
        let mut k = self.lock();
        if matches!(
            k.state,
            RunState::Starting | RunState::Started | RunState::Stopping
        ) {
            return Err(SimError::IllegalState(k.state));
        }

        k.events.clear();
        k.event_count = 0;
        self.clock.reset(replication.start_time());

        k.events.insert_control(
            replication.warmup_time(),
            WARMUP_PRIORITY,
            EventKind::Warmup,
        );
        k.events.insert_control(
            replication.end_time(),
            END_PRIORITY,
            EventKind::EndReplication,
        );
        k.replication = Some(replication);

        let constructed = {
            let Kernel {
                model,
                events,
                replication,
                rng,
                ..
            } = &mut *k;
            let replication = replication.as_ref().expect("replication just bound");
            let mut ctx = SimContext {
                model,
                events,
                clock: &self.clock,
                bus: &self.bus,
                replication,
                rng,
            };
            M::construct_model(&mut ctx)
        };
        if let Err(err) = constructed {
            k.events.clear();
            k.replication = None;
            k.state = RunState::Initial;
            return Err(SimError::ConstructFailed(err));
        }

        k.state = RunState::Initialized;
        drop(k);
        self.notify_eventlist_changed();
        Ok(())
    }

    ///
    /// Schedules an action at an absolute simulation time.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::IllegalState`] before `initialize`, with
    /// [`SimError::ScheduleInPast`] for a time before the current clock and
    /// with [`SimError::PriorityOutOfRange`] for a reserved priority.
    ///
    pub fn schedule_event(
        &self,
        time: SimTime,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        let mut k = self.lock();
        if k.replication.is_none() {
            return Err(SimError::IllegalState(k.state));
        }
        let handle = k.events.schedule(self.clock.now(), time, priority, action)?;
        drop(k);
        self.notify_eventlist_changed();
        Ok(handle)
    }

    ///
    /// Schedules an action `delay` after the current simulation time.
    ///
    /// # Errors
    ///
    /// As [`Simulator::schedule_event`], plus [`SimError::TimeOverflow`]
    /// when `now + delay` is not representable.
    ///
    pub fn schedule_event_rel(
        &self,
        delay: Duration,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        let time = self.clock.now().try_add(delay)?;
        self.schedule_event(time, priority, action)
    }

    ///
    /// Schedules an action at the current instant.
    ///
    /// # Errors
    ///
    /// As [`Simulator::schedule_event`].
    ///
    pub fn schedule_event_now(
        &self,
        priority: Priority,
        action: Action<M>,
    ) -> Result<EventHandle, SimError> {
        self.schedule_event(self.clock.now(), priority, action)
    }

    ///
    /// Cancels a pending event. Idempotent: returns `false` for an event
    /// that already fired, was cancelled, or belongs to another simulator.
    ///
    pub fn cancel_event(&self, handle: &EventHandle) -> bool {
        let mut k = self.lock();
        let cancelled = k.events.cancel(handle);
        drop(k);
        if cancelled {
            self.notify_eventlist_changed();
        }
        cancelled
    }

    ///
    /// Executes a single event: pops the earliest pending event, advances
    /// the clock to its firing time and runs its action. A no-op on an
    /// empty event list.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::IllegalState`] unless the simulator is
    /// initialized or stopped.
    ///
    pub fn step(&self) -> Result<(), SimError> {
        let mut k = self.lock();
        self.begin_run(&mut k)?;
        if !k.events.is_empty() {
            self.dispatch_next(&mut k);
        }
        if matches!(k.state, RunState::Started | RunState::Stopping) {
            self.finish_stop(&mut k);
        }
        Ok(())
    }

    ///
    /// Runs the replication to its end: executes events until the
    /// end-replication control event fires (or the run is stopped or
    /// paused).
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::IllegalState`] unless the simulator is
    /// initialized or stopped.
    ///
    pub fn start(&self) -> Result<(), SimError> {
        let until = {
            let k = self.lock();
            k.replication
                .as_ref()
                .ok_or(SimError::IllegalState(k.state))?
                .end_time()
        };
        self.run_loop(until, true)
    }

    ///
    /// Runs until the given simulation time. With `including` the events at
    /// `until` fire as well; without it they stay pending and the clock
    /// still ends up at `until`.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::IllegalState`] unless the simulator is
    /// initialized or stopped.
    ///
    pub fn run_until(&self, until: SimTime, including: bool) -> Result<(), SimError> {
        self.run_loop(until, including)
    }

    ///
    /// Requests the running simulation to pause between two events.
    ///
    /// # Errors
    ///
    /// Fails with [`SimError::IllegalState`] if no run is executing.
    ///
    pub fn stop(&self) -> Result<(), SimError> {
        let mut k = self.lock();
        match k.state {
            RunState::Starting | RunState::Started => {
                k.state = RunState::Stopping;
                Ok(())
            }
            state => Err(SimError::IllegalState(state)),
        }
    }

    fn run_loop(&self, until: SimTime, including: bool) -> Result<(), SimError> {
        {
            let mut k = self.lock();
            self.begin_run(&mut k)?;
        }

        loop {
            let mut k = self.lock();
            match k.state {
                RunState::Started => {}
                RunState::Stopping => {
                    self.finish_stop(&mut k);
                    return Ok(());
                }
                RunState::Ended => return Ok(()),
                // The kernel was disturbed from outside mid-run.
                state => return Err(SimError::IllegalState(state)),
            }

            let at_boundary = match k.events.first() {
                None => true,
                Some(key) => key.time > until || (key.time == until && !including),
            };
            if at_boundary {
                self.clock.advance_to(until);
                k.state = RunState::Stopping;
                self.finish_stop(&mut k);
                return Ok(());
            }

            self.dispatch_next(&mut k);
            // The kernel lock is released here, between two events, which
            // is where external stop() and schedule calls are admitted.
        }
    }

    fn begin_run(&self, k: &mut Kernel<M>) -> Result<(), SimError> {
        match k.state {
            RunState::Initialized | RunState::Stopped => {}
            state => return Err(SimError::IllegalState(state)),
        }
        k.state = RunState::Starting;
        self.bus.publish(&BusEvent::timed(
            &START_EVENT,
            Payload::Empty,
            self.clock.now(),
        ));
        k.state = RunState::Started;
        Ok(())
    }

    fn finish_stop(&self, k: &mut Kernel<M>) {
        self.bus.publish(&BusEvent::timed(
            &STOP_EVENT,
            Payload::Empty,
            self.clock.now(),
        ));
        k.state = RunState::Stopped;
    }

    ///
    /// Pops and executes the earliest pending event. The clock only moves
    /// here, after `TIME_CHANGED_EVENT` announced the new time.
    ///
    fn dispatch_next(&self, k: &mut Kernel<M>) {
        let Some(mut event) = k.events.pop_first() else {
            return;
        };

        let time = event.time();
        if time != self.clock.now() {
            self.bus
                .publish(&BusEvent::timed(&TIME_CHANGED_EVENT, Payload::Empty, time));
        }
        self.clock.advance_to(time);
        k.event_count += 1;

        let Ok(kind) = event.fire() else {
            // Not pending anymore; never dispatched.
            return;
        };
        match kind {
            EventKind::User(action) => {
                let outcome = {
                    let Kernel {
                        model,
                        events,
                        replication,
                        rng,
                        ..
                    } = &mut *k;
                    let replication =
                        replication.as_ref().expect("replication bound after initialize");
                    let mut ctx = SimContext {
                        model,
                        events,
                        clock: &self.clock,
                        bus: &self.bus,
                        replication,
                        rng,
                    };
                    action.invoke(&mut ctx)
                };
                if let Err(err) = outcome {
                    self.apply_strategy(k, &*err);
                }
            }
            EventKind::Warmup => {
                self.bus
                    .publish(&BusEvent::timed(&WARMUP_EVENT, Payload::Empty, time));
            }
            EventKind::EndReplication => {
                self.bus.publish(&BusEvent::timed(
                    &END_REPLICATION_EVENT,
                    Payload::Empty,
                    time,
                ));
                k.events.clear();
                k.state = RunState::Ended;
                self.notify_eventlist_changed();
            }
        }
    }

    fn apply_strategy(&self, k: &mut Kernel<M>, err: &(dyn Error + Send + Sync)) {
        match k.strategy {
            ErrorStrategy::LogAndContinue => {
                tracing::error!("event action failed, continuing: {err}");
            }
            ErrorStrategy::WarnAndPause => {
                tracing::warn!("event action failed, pausing the run: {err}");
                k.state = RunState::Stopping;
            }
            ErrorStrategy::WarnAndEnd => {
                tracing::warn!("event action failed, ending the replication: {err}");
                k.events.clear();
                k.state = RunState::Ended;
                self.notify_eventlist_changed();
            }
        }
    }

    /// The current simulation time.
    #[must_use]
    pub fn sim_time(&self) -> SimTime {
        self.clock.now()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.lock().state
    }

    /// The simulator's event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// A cloneable handle onto the shared simulation clock.
    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    /// The replication currently bound, if any.
    #[must_use]
    pub fn replication(&self) -> Option<Replication> {
        self.lock().replication.clone()
    }

    /// The number of pending events in the event list.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.lock().events.len()
    }

    /// The number of events dispatched since the last `initialize`.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.lock().event_count
    }

    /// Replaces the strategy applied to event action faults.
    pub fn set_error_strategy(&self, strategy: ErrorStrategy) {
        self.lock().strategy = strategy;
    }

    /// Runs a closure against the model, under the kernel lock.
    pub fn with_model<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.lock().model)
    }

    /// Runs a closure against the mutable model, under the kernel lock.
    pub fn with_model_mut<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        f(&mut self.lock().model)
    }

    /// Deconstructs the simulator and returns the model.
    #[must_use]
    pub fn into_model(self) -> M {
        self.kernel
            .into_inner()
            .expect("simulation kernel poisoned")
            .model
    }
}

impl<M: Model> Debug for Simulator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let k = self.lock();
        write!(
            f,
            "Simulator {{ sim_time: {} state: {:?} dispatched: {} enqueued: {} }}",
            self.clock.now(),
            k.state,
            k.event_count,
            k.events.len()
        )
    }
}
