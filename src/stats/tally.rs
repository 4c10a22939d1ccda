use super::{Observer, ObserverCore, Statistic};
use crate::bus::{BusEvent, EventType, NotifyResult, Subscriber, SubscriberId};
use crate::runtime::{Model, SimContext, SimHandle};
use crate::time::SimTime;
use std::fmt::Display;
use std::sync::{Arc, Mutex, Weak};

///
/// An observer aggregating unweighted observations: count, sum,
/// sum-of-squares, minimum and maximum.
///
pub struct Tally {
    core: ObserverCore,
    inner: Mutex<TallyInner>,
}

impl Tally {
    ///
    /// Creates a tally against the model of the given context, registers it
    /// in the model's statistics and binds it under the replication
    /// context. Accumulation starts at the warmup instant, or immediately
    /// when constructed past warmup.
    ///
    pub fn new<M: Model>(description: impl Into<String>, ctx: &mut SimContext<'_, M>) -> Arc<Tally> {
        let this = Arc::new(Tally {
            core: ObserverCore::new(description.into(), ctx.observer_host()),
            inner: Mutex::new(TallyInner::new()),
        });
        this.core.attach(&this);
        ctx.model.output_statistics().insert(this.clone());
        this
    }

    ///
    /// Additionally subscribes this tally to an application-chosen event
    /// type, so observations are delivered through the bus. The tally does
    /// not keep itself alive through this subscription.
    ///
    pub fn listen(this: &Arc<Self>, event_type: &'static EventType) -> SubscriberId {
        this.core
            .host()
            .bus()
            .subscribe_weak(event_type, Arc::downgrade(this) as Weak<dyn Subscriber>)
    }

    /// The number of registered observations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// The sum of all registered observations.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.lock().sum()
    }

    /// The sum of squares of all registered observations.
    #[must_use]
    pub fn sqr_sum(&self) -> f64 {
        self.lock().sqr_sum()
    }

    /// The smallest registered observation.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.lock().min()
    }

    /// The greatest registered observation.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.lock().max()
    }

    /// The arithmetic mean of the registered observations.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.lock().mean()
    }

    /// The sample variance of the registered observations.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.lock().variance()
    }

    /// The sample standard deviation of the registered observations.
    #[must_use]
    pub fn std_deviation(&self) -> f64 {
        self.lock().std_deviation()
    }

    /// A point-in-time copy of the running statistics.
    #[must_use]
    pub fn summary(&self) -> TallySummary {
        let inner = self.lock();
        TallySummary {
            description: self.core.description().to_string(),
            count: inner.len(),
            sum: inner.sum(),
            min: inner.min(),
            max: inner.max(),
            mean: inner.mean(),
            std_deviation: inner.std_deviation(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TallyInner> {
        self.inner.lock().expect("tally statistics poisoned")
    }
}

impl Observer for Tally {
    fn description(&self) -> &str {
        self.core.description()
    }

    fn initialize(&self) {
        self.lock().clear();
        self.core.activate();
        self.core.emit_initialized();
    }

    fn register(&self, value: f64) -> f64 {
        if !self.core.is_active() {
            return value;
        }
        self.lock().collect_at(value, self.core.host().sim_time());
        self.core.emit_observation(value);
        value
    }

    fn sim(&self) -> &SimHandle {
        self.core.host()
    }
}

impl Subscriber for Tally {
    fn notify(&self, event: &BusEvent) -> NotifyResult {
        self.core.route(event, self)
    }
}

impl Display for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        write!(
            f,
            "{}: mean {:>7.3} dev {:>7.3} (min: {:>7.3} max: {:>7.3} n: {})",
            self.core.description(),
            inner.mean(),
            inner.std_deviation(),
            inner.min(),
            inner.max(),
            inner.len()
        )
    }
}

impl std::fmt::Debug for Tally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tally")
            .field("description", &self.core.description())
            .field("count", &self.count())
            .finish()
    }
}

/// A point-in-time copy of a [`Tally`]'s statistics.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TallySummary {
    pub description: String,
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_deviation: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct TallyInner {
    count: usize,
    sum: f64,
    sqr_sum: f64,
    min: f64,
    max: f64,
}

impl TallyInner {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sqr_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Statistic for TallyInner {
    type Value = f64;

    fn collect_weighted_at(&mut self, value: Self::Value, weight: f64, _sim_time: SimTime) {
        self.count += 1;

        if self.min > value {
            self.min = value;
        }
        if self.max < value {
            self.max = value;
        }

        self.sum += weight * value;
        self.sqr_sum += weight * value * value;
    }

    fn len(&self) -> usize {
        self.count
    }

    fn sum(&self) -> Self::Value {
        self.sum
    }

    fn sqr_sum(&self) -> Self::Value {
        self.sqr_sum
    }

    fn min(&self) -> Self::Value {
        self.min
    }

    fn max(&self) -> Self::Value {
        self.max
    }

    fn mean(&self) -> Self::Value {
        self.sum / (self.count as f64)
    }

    fn variance(&self) -> Self::Value {
        if self.count < 2 {
            f64::NAN
        } else {
            let n = self.count as f64;
            let var = (self.sqr_sum - self.sum * self.sum / n) / (n - 1.0);
            var.max(0.0)
        }
    }

    fn std_deviation(&self) -> Self::Value {
        self.variance().sqrt()
    }
}
