use super::{Observer, ObserverCore};
use crate::bus::{BusEvent, EventType, NotifyResult, Subscriber, SubscriberId};
use crate::runtime::{Model, SimContext, SimHandle};
use std::fmt::Display;
use std::sync::{Arc, Mutex, Weak};

///
/// An observer accumulating integer counts.
///
/// Every registered value is rounded to the nearest integer and added to
/// the running total; the count tracks the number of observations.
///
pub struct Counter {
    core: ObserverCore,
    inner: Mutex<CounterInner>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CounterInner {
    count: u64,
    total: i64,
}

impl Counter {
    ///
    /// Creates a counter against the model of the given context, registers
    /// it in the model's statistics and binds it under the replication
    /// context.
    ///
    pub fn new<M: Model>(
        description: impl Into<String>,
        ctx: &mut SimContext<'_, M>,
    ) -> Arc<Counter> {
        let this = Arc::new(Counter {
            core: ObserverCore::new(description.into(), ctx.observer_host()),
            inner: Mutex::new(CounterInner::default()),
        });
        this.core.attach(&this);
        ctx.model.output_statistics().insert(this.clone());
        this
    }

    ///
    /// Additionally subscribes this counter to an application-chosen event
    /// type, so observations are delivered through the bus.
    ///
    pub fn listen(this: &Arc<Self>, event_type: &'static EventType) -> SubscriberId {
        this.core
            .host()
            .bus()
            .subscribe_weak(event_type, Arc::downgrade(this) as Weak<dyn Subscriber>)
    }

    /// The number of registered observations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// The accumulated integer total.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.lock().total
    }

    /// A point-in-time copy of the running statistics.
    #[must_use]
    pub fn summary(&self) -> CounterSummary {
        let inner = *self.lock();
        CounterSummary {
            description: self.core.description().to_string(),
            count: inner.count,
            total: inner.total,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CounterInner> {
        self.inner.lock().expect("counter statistics poisoned")
    }
}

impl Observer for Counter {
    fn description(&self) -> &str {
        self.core.description()
    }

    fn initialize(&self) {
        *self.lock() = CounterInner::default();
        self.core.activate();
        self.core.emit_initialized();
    }

    fn register(&self, value: f64) -> f64 {
        if !self.core.is_active() {
            return value;
        }
        {
            let mut inner = self.lock();
            inner.count += 1;
            inner.total += value.round() as i64;
        }
        self.core.emit_observation(value);
        value
    }

    fn sim(&self) -> &SimHandle {
        self.core.host()
    }
}

impl Subscriber for Counter {
    fn notify(&self, event: &BusEvent) -> NotifyResult {
        self.core.route(event, self)
    }
}

impl Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = *self.lock();
        write!(
            f,
            "{}: total {} (n: {})",
            self.core.description(),
            inner.total,
            inner.count
        )
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter")
            .field("description", &self.core.description())
            .field("count", &self.count())
            .field("total", &self.total())
            .finish()
    }
}

/// A point-in-time copy of a [`Counter`]'s statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterSummary {
    pub description: String,
    pub count: u64,
    pub total: i64,
}
