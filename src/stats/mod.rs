//!
//! Statistics observers: subscribers that fold timed observations into
//! running summaries.
//!
//! An observer is created against a model (usually inside
//! `Model::construct_model`), registers itself in the model's
//! [`StatisticsSet`], binds itself under the replication context's
//! `statistics/` sub-context and starts accumulating at the warmup instant
//! of the replication. Every accepted observation is re-published on the
//! bus as a timed [`TIMED_OBSERVATION_ADDED_EVENT`], so exporters and UIs
//! can follow a statistic without touching the observer itself.
//!

use crate::bus::{BusEvent, EventType, NotifyResult, Payload, Subscriber};
use crate::naming::Context;
use crate::runtime::{SimHandle, WARMUP_EVENT};
use crate::time::SimTime;
use std::any::Any;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

mod counter;
mod persistent;
mod tally;

pub use counter::{Counter, CounterSummary};
pub use persistent::{Persistent, PersistentSummary};
pub use tally::{Tally, TallySummary};

/// Published by an observer for every accepted observation; the payload is
/// the observed value, the timestamp the simulation time of the
/// observation.
pub static TIMED_OBSERVATION_ADDED_EVENT: EventType =
    EventType::new("TIMED_OBSERVATION_ADDED_EVENT");
/// Published by an observer when its statistics are (re)initialized; the
/// payload is the observer itself.
pub static TIMED_INITIALIZED_EVENT: EventType = EventType::new("TIMED_INITIALIZED_EVENT");

/// The sub-context of the replication context under which observers bind
/// themselves by description.
const STATISTICS_SUBCONTEXT: &str = "statistics";

///
/// A type that allows for statistical data collection inside a given
/// simulation run.
///
pub trait Statistic {
    ///
    /// The type of values collected by this statistic.
    ///
    type Value;

    ///
    /// Collects a datapoint at a given time with a given weight.
    /// This function is the core of the data collection.
    ///
    fn collect_weighted_at(&mut self, value: Self::Value, weight: f64, sim_time: SimTime);

    ///
    /// Collects a non-weighted (w=1) datapoint at a given time.
    ///
    fn collect_at(&mut self, value: Self::Value, sim_time: SimTime) {
        self.collect_weighted_at(value, 1.0, sim_time);
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn len(&self) -> usize;
    fn sum(&self) -> Self::Value;
    fn sqr_sum(&self) -> Self::Value;
    fn min(&self) -> Self::Value;
    fn max(&self) -> Self::Value;
    fn mean(&self) -> Self::Value;
    fn variance(&self) -> Self::Value;
    fn std_deviation(&self) -> Self::Value;
}

///
/// A statistics observer: an aggregator of timed observations.
///
pub trait Observer: Subscriber {
    /// The immutable description of this observer, also its binding name.
    fn description(&self) -> &str;

    ///
    /// Resets the running statistics and announces the reset with a timed
    /// [`TIMED_INITIALIZED_EVENT`]. Called once when the warmup instant is
    /// reached, or immediately at construction past warmup.
    ///
    fn initialize(&self);

    ///
    /// Folds one observation into the statistics and re-publishes it as a
    /// timed [`TIMED_OBSERVATION_ADDED_EVENT`]. Returns the value, so calls
    /// can be chained into expressions. Observations arriving before the
    /// observer is initialized are discarded.
    ///
    fn register(&self, value: f64) -> f64;

    /// The back-reference onto the simulator this observer watches.
    fn sim(&self) -> &SimHandle;
}

/// The plumbing shared by all observers: description, simulator handle,
/// warmup arming and the bus re-publishing of observations.
pub(crate) struct ObserverCore {
    description: String,
    host: SimHandle,
    active: AtomicBool,
    warmup_sub: Mutex<Option<crate::bus::SubscriberId>>,
    self_ref: Mutex<Option<Weak<dyn Any + Send + Sync>>>,
}

impl ObserverCore {
    pub(crate) fn new(description: String, host: SimHandle) -> Self {
        Self {
            description,
            host,
            active: AtomicBool::new(false),
            warmup_sub: Mutex::new(None),
            self_ref: Mutex::new(None),
        }
    }

    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn host(&self) -> &SimHandle {
        &self.host
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    ///
    /// Wires a freshly constructed observer into the simulation: keeps a
    /// weak self-reference for event payloads, binds the observer under
    /// `statistics/` in the replication context (non-fatally) and either
    /// initializes it right away (past warmup) or arms a one-shot warmup
    /// subscription.
    ///
    pub(crate) fn attach<O>(&self, this: &Arc<O>)
    where
        O: Observer + Send + Sync + 'static,
    {
        *self.self_ref.lock().expect("observer core poisoned") =
            Some(Arc::downgrade(this) as Weak<dyn Any + Send + Sync>);

        let statistics = Context::lookup_or_create_sub_context(
            self.host.replication().context(),
            STATISTICS_SUBCONTEXT,
        );
        if let Err(err) = statistics.bind_object(
            self.description.clone(),
            Arc::clone(this) as Arc<dyn Any + Send + Sync>,
        ) {
            tracing::warn!(
                observer = self.description.as_str(),
                "could not bind observer in context: {err}"
            );
        }

        if self.host.sim_time() > self.host.replication().warmup_time() {
            this.initialize();
        } else {
            let id = self
                .host
                .bus()
                .subscribe_weak(&WARMUP_EVENT, Arc::downgrade(this) as Weak<dyn Subscriber>);
            *self.warmup_sub.lock().expect("observer core poisoned") = Some(id);
        }
    }

    /// Drops the one-shot warmup subscription, if still armed.
    pub(crate) fn disarm_warmup(&self) {
        if let Some(id) = self.warmup_sub.lock().expect("observer core poisoned").take() {
            self.host.bus().unsubscribe(&WARMUP_EVENT, id);
        }
    }

    pub(crate) fn emit_initialized(&self) {
        let payload = self
            .self_ref
            .lock()
            .expect("observer core poisoned")
            .as_ref()
            .and_then(Weak::upgrade)
            .map_or(Payload::Empty, Payload::Object);
        self.host.bus().publish(&BusEvent::timed(
            &TIMED_INITIALIZED_EVENT,
            payload,
            self.host.sim_time(),
        ));
    }

    pub(crate) fn emit_observation(&self, value: f64) {
        self.host.bus().publish(&BusEvent::timed(
            &TIMED_OBSERVATION_ADDED_EVENT,
            Payload::Scalar(value),
            self.host.sim_time(),
        ));
    }

    ///
    /// The shared `notify` behaviour of all observers: a warmup event
    /// triggers the one-shot initialization; a timed event is projected
    /// onto its numeric payload and registered; anything else is logged
    /// and dropped.
    ///
    pub(crate) fn route(&self, event: &BusEvent, observer: &dyn Observer) -> NotifyResult {
        if event.event_type() == &WARMUP_EVENT {
            self.disarm_warmup();
            observer.initialize();
            return Ok(());
        }
        if !event.is_timed() {
            tracing::warn!(
                observer = self.description.as_str(),
                event = %event.event_type(),
                "event not a TimedEvent, discarding"
            );
            return Ok(());
        }
        match event.payload().as_scalar() {
            Some(value) => {
                observer.register(value);
            }
            None => tracing::warn!(
                observer = self.description.as_str(),
                event = %event.event_type(),
                "timed event carries no numeric payload, discarding"
            ),
        }
        Ok(())
    }
}

impl Debug for ObserverCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverCore")
            .field("description", &self.description)
            .field("active", &self.is_active())
            .finish()
    }
}

///
/// The collection owning a model's statistics observers, in creation order.
///
#[derive(Default)]
pub struct StatisticsSet {
    entries: Vec<Arc<dyn Observer>>,
}

impl StatisticsSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer. Called by the observer constructors.
    pub fn insert(&mut self, observer: Arc<dyn Observer>) {
        self.entries.push(observer);
    }

    /// Looks up an observer by its description.
    #[must_use]
    pub fn get(&self, description: &str) -> Option<&Arc<dyn Observer>> {
        self.entries
            .iter()
            .find(|observer| observer.description() == description)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Observer>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Debug for StatisticsSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|observer| observer.description()))
            .finish()
    }
}
