use super::{Observer, ObserverCore, Statistic};
use crate::bus::{BusEvent, EventType, NotifyResult, Subscriber, SubscriberId};
use crate::runtime::{Model, SimContext, SimHandle};
use crate::time::SimTime;
use std::fmt::Display;
use std::sync::{Arc, Mutex, Weak};

///
/// An observer computing time-weighted statistics.
///
/// Between two successive observations the previous value is assumed to
/// persist; it is weighted by the simulation-time delta separating them.
/// The mean of a persistent observer is therefore the time average of the
/// observed quantity, e.g. a queue length.
///
pub struct Persistent {
    core: ObserverCore,
    inner: Mutex<PersistentInner>,
}

impl Persistent {
    ///
    /// Creates a persistent observer against the model of the given
    /// context, registers it in the model's statistics and binds it under
    /// the replication context.
    ///
    pub fn new<M: Model>(
        description: impl Into<String>,
        ctx: &mut SimContext<'_, M>,
    ) -> Arc<Persistent> {
        let this = Arc::new(Persistent {
            core: ObserverCore::new(description.into(), ctx.observer_host()),
            inner: Mutex::new(PersistentInner::new(SimTime::ZERO)),
        });
        this.core.attach(&this);
        ctx.model.output_statistics().insert(this.clone());
        this
    }

    ///
    /// Additionally subscribes this observer to an application-chosen event
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
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// The time-weighted mean of the observed quantity.
    #[must_use]
    pub fn weighted_mean(&self) -> f64 {
        self.lock().mean()
    }

    /// The smallest observed value.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.lock().min()
    }

    /// The greatest observed value.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.lock().max()
    }

    /// The total simulation-time span covered by observations, in seconds.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.lock().total_span
    }

    /// A point-in-time copy of the running statistics.
    #[must_use]
    pub fn summary(&self) -> PersistentSummary {
        let inner = self.lock();
        PersistentSummary {
            description: self.core.description().to_string(),
            count: inner.len(),
            weighted_mean: inner.mean(),
            min: inner.min(),
            max: inner.max(),
            span: inner.total_span,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistentInner> {
        self.inner.lock().expect("persistent statistics poisoned")
    }
}

impl Observer for Persistent {
    fn description(&self) -> &str {
        self.core.description()
    }

    fn initialize(&self) {
        *self.lock() = PersistentInner::new(self.core.host().sim_time());
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

impl Subscriber for Persistent {
    fn notify(&self, event: &BusEvent) -> NotifyResult {
        self.core.route(event, self)
    }
}

impl Display for Persistent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        write!(
            f,
            "{}: time-weighted mean {:>7.3} over {:.3}s (min: {:>7.3} max: {:>7.3} n: {})",
            self.core.description(),
            inner.mean(),
            inner.total_span,
            inner.min(),
            inner.max(),
            inner.len()
        )
    }
}

impl std::fmt::Debug for Persistent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistent")
            .field("description", &self.core.description())
            .field("count", &self.count())
            .finish()
    }
}

/// A point-in-time copy of a [`Persistent`]'s statistics.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistentSummary {
    pub description: String,
    pub count: usize,
    pub weighted_mean: f64,
    pub min: f64,
    pub max: f64,
    pub span: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct PersistentInner {
    last_value: Option<f64>,
    last_time: SimTime,

    count: usize,
    weighted_sum: f64,
    sqr_weighted_sum: f64,
    total_span: f64,

    min: f64,
    max: f64,
}

impl PersistentInner {
    fn new(start: SimTime) -> Self {
        Self {
            last_value: None,
            last_time: start,

            count: 0,
            weighted_sum: 0.0,
            sqr_weighted_sum: 0.0,
            total_span: 0.0,

            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Statistic for PersistentInner {
    type Value = f64;

    fn collect_weighted_at(&mut self, value: Self::Value, _weight: f64, sim_time: SimTime) {
        if let Some(previous) = self.last_value {
            let delta = sim_time.saturating_duration_since(self.last_time).as_secs_f64();
            self.weighted_sum += previous * delta;
            self.sqr_weighted_sum += previous * previous * delta;
            self.total_span += delta;
        }

        self.count += 1;
        if self.min > value {
            self.min = value;
        }
        if self.max < value {
            self.max = value;
        }

        self.last_value = Some(value);
        self.last_time = sim_time;
    }

    fn len(&self) -> usize {
        self.count
    }

    fn sum(&self) -> Self::Value {
        self.weighted_sum
    }

    fn sqr_sum(&self) -> Self::Value {
        self.sqr_weighted_sum
    }

    fn min(&self) -> Self::Value {
        self.min
    }

    fn max(&self) -> Self::Value {
        self.max
    }

    fn mean(&self) -> Self::Value {
        if self.total_span == 0.0 {
            f64::NAN
        } else {
            self.weighted_sum / self.total_span
        }
    }

    fn variance(&self) -> Self::Value {
        if self.total_span == 0.0 {
            f64::NAN
        } else {
            let mean = self.mean();
            (self.sqr_weighted_sum / self.total_span - mean * mean).max(0.0)
        }
    }

    fn std_deviation(&self) -> Self::Value {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_by_elapsed_time() {
        let mut inner = PersistentInner::new(SimTime::ZERO);

        // 2.0 persists for 4s, then 6.0 for 1s.
        inner.collect_at(2.0, SimTime::ZERO);
        inner.collect_at(6.0, SimTime::from(4.0));
        inner.collect_at(0.0, SimTime::from(5.0));

        assert_eq!(inner.len(), 3);
        assert_eq!(inner.total_span, 5.0);
        assert!((inner.mean() - (2.0 * 4.0 + 6.0 * 1.0) / 5.0).abs() < 1e-12);
        assert_eq!(inner.min(), 0.0);
        assert_eq!(inner.max(), 6.0);
    }

    #[test]
    fn mean_is_nan_without_elapsed_time() {
        let mut inner = PersistentInner::new(SimTime::ZERO);
        assert!(inner.mean().is_nan());
        inner.collect_at(3.0, SimTime::ZERO);
        assert!(inner.mean().is_nan());
    }

    #[test]
    fn variance_of_constant_signal_is_zero() {
        let mut inner = PersistentInner::new(SimTime::ZERO);
        inner.collect_at(5.0, SimTime::ZERO);
        inner.collect_at(5.0, SimTime::from(2.0));
        inner.collect_at(5.0, SimTime::from(7.0));
        assert_eq!(inner.variance(), 0.0);
        assert_eq!(inner.mean(), 5.0);
    }
}
