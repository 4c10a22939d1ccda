//!
//! Publish/subscribe of typed simulation events.
//!
//! The bus carries a closed set of event types, each described by a static
//! [`EventType`] descriptor with a stable identity. Subscribers register per
//! type, either strongly (the bus keeps them alive) or weakly (the bus prunes
//! them once dropped). Dispatch is synchronous and happens on the thread that
//! publishes, in registration order.
//!

use crate::time::SimTime;
use fxhash::FxHashMap;
use std::any::Any;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

///
/// The immutable descriptor of an event type.
///
/// Descriptors are declared as module-level statics and compared by name,
/// so two references to the same descriptor are always equal.
///
#[derive(Debug)]
pub struct EventType {
    name: &'static str,
}

impl EventType {
    /// Declares a new event type descriptor.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    /// The stable name of this event type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EventType {}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

///
/// The content carried by a bus event.
///
#[derive(Clone, Default)]
pub enum Payload {
    /// No content beyond the event type itself.
    #[default]
    Empty,
    /// A numeric observation.
    Scalar(f64),
    /// A short textual content, e.g. a description.
    Text(Arc<str>),
    /// An arbitrary shared object, e.g. the emitting observer.
    Object(Arc<dyn Any + Send + Sync>),
}

impl Payload {
    /// Projects the payload onto a numeric value, if it carries one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Payload::Scalar(value) => Some(*value),
            _ => None,
        }
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Scalar(value) => write!(f, "Scalar({value})"),
            Payload::Text(text) => write!(f, "Text({text})"),
            Payload::Object(_) => f.write_str("Object(..)"),
        }
    }
}

///
/// An event published on the bus, optionally stamped with the simulation
/// time at which it was produced.
///
#[derive(Clone, Debug)]
pub struct BusEvent {
    event_type: &'static EventType,
    payload: Payload,
    timestamp: Option<SimTime>,
}

impl BusEvent {
    /// Creates an untimed event.
    #[must_use]
    pub fn new(event_type: &'static EventType, payload: Payload) -> Self {
        Self {
            event_type,
            payload,
            timestamp: None,
        }
    }

    /// Creates an event stamped with a simulation time.
    #[must_use]
    pub fn timed(event_type: &'static EventType, payload: Payload, timestamp: SimTime) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Some(timestamp),
        }
    }

    /// The descriptor of this event.
    #[must_use]
    pub fn event_type(&self) -> &'static EventType {
        self.event_type
    }

    /// The content of this event.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The simulation time of a timed event, `None` for untimed ones.
    #[must_use]
    pub fn timestamp(&self) -> Option<SimTime> {
        self.timestamp
    }

    /// Whether this event carries a simulation timestamp.
    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.timestamp.is_some()
    }
}

/// The result of delivering one event to one subscriber.
pub type NotifyResult = Result<(), Box<dyn Error + Send + Sync>>;

///
/// A receiver of bus events.
///
/// A subscriber that fails is isolated: the error is logged and the dispatch
/// pass continues with the remaining subscribers.
///
pub trait Subscriber: Send + Sync {
    /// Delivers one published event.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the bus logs the error and carries on.
    fn notify(&self, event: &BusEvent) -> NotifyResult;
}

///
/// How the bus holds on to a subscriber.
///
pub enum SubscriberRef {
    /// The bus keeps the subscriber alive.
    Strong(Arc<dyn Subscriber>),
    /// The bus observes the subscriber; the slot is pruned lazily once the
    /// subscriber is dropped elsewhere.
    Weak(Weak<dyn Subscriber>),
}

impl SubscriberRef {
    fn upgrade(&self) -> Option<Arc<dyn Subscriber>> {
        match self {
            SubscriberRef::Strong(subscriber) => Some(Arc::clone(subscriber)),
            SubscriberRef::Weak(subscriber) => subscriber.upgrade(),
        }
    }
}

impl Debug for SubscriberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriberRef::Strong(_) => f.write_str("Strong(..)"),
            SubscriberRef::Weak(_) => f.write_str("Weak(..)"),
        }
    }
}

///
/// A token identifying one registration, used to unsubscribe.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Slot {
    id: SubscriberId,
    subscriber: SubscriberRef,
}

///
/// The publish/subscribe dispatcher of a simulator.
///
/// `publish` snapshots the registration list before notifying, so a
/// subscriber may unsubscribe itself (or publish further events) during
/// dispatch without affecting the in-flight pass.
///
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<FxHashMap<&'static str, Vec<Slot>>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Registers a subscriber for one event type. Notifications arrive in
    /// registration order.
    ///
    pub fn subscribe(
        &self,
        event_type: &'static EventType,
        subscriber: SubscriberRef,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut registry = self.registry.write().expect("bus registry poisoned");
        registry
            .entry(event_type.name())
            .or_default()
            .push(Slot { id, subscriber });
        id
    }

    /// Registers a subscriber the bus keeps alive.
    pub fn subscribe_strong(
        &self,
        event_type: &'static EventType,
        subscriber: Arc<dyn Subscriber>,
    ) -> SubscriberId {
        self.subscribe(event_type, SubscriberRef::Strong(subscriber))
    }

    /// Registers a subscriber the bus does not keep alive.
    pub fn subscribe_weak(
        &self,
        event_type: &'static EventType,
        subscriber: Weak<dyn Subscriber>,
    ) -> SubscriberId {
        self.subscribe(event_type, SubscriberRef::Weak(subscriber))
    }

    ///
    /// Removes one registration. Returns `true` iff it was still present.
    ///
    pub fn unsubscribe(&self, event_type: &'static EventType, id: SubscriberId) -> bool {
        let mut registry = self.registry.write().expect("bus registry poisoned");
        let Some(slots) = registry.get_mut(event_type.name()) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        slots.len() != before
    }

    /// The number of live registrations for one event type.
    #[must_use]
    pub fn subscriber_count(&self, event_type: &'static EventType) -> usize {
        let registry = self.registry.read().expect("bus registry poisoned");
        registry
            .get(event_type.name())
            .map(|slots| {
                slots
                    .iter()
                    .filter(|slot| slot.subscriber.upgrade().is_some())
                    .count()
            })
            .unwrap_or(0)
    }

    ///
    /// Delivers an event to every subscriber of its type, in registration
    /// order. Subscriber failures are logged and never lose the event for
    /// the remaining subscribers; dead weak slots are pruned.
    ///
    pub fn publish(&self, event: &BusEvent) {
        let mut live = Vec::new();
        let mut dead = Vec::new();
        {
            let registry = self.registry.read().expect("bus registry poisoned");
            if let Some(slots) = registry.get(event.event_type().name()) {
                for slot in slots {
                    match slot.subscriber.upgrade() {
                        Some(subscriber) => live.push(subscriber),
                        None => dead.push(slot.id),
                    }
                }
            }
        }

        for subscriber in live {
            if let Err(err) = subscriber.notify(event) {
                tracing::error!(
                    event = %event.event_type(),
                    "subscriber failed during notify: {err}"
                );
            }
        }

        if !dead.is_empty() {
            let mut registry = self.registry.write().expect("bus registry poisoned");
            if let Some(slots) = registry.get_mut(event.event_type().name()) {
                slots.retain(|slot| !dead.contains(&slot.id));
            }
        }
    }
}

impl Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read().expect("bus registry poisoned");
        let mut map = f.debug_map();
        for (name, slots) in registry.iter() {
            map.entry(name, &slots.len());
        }
        map.finish()
    }
}
