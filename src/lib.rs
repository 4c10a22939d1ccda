//!
//! A simulation kernel for discrete event simulations.
//!
//! The kernel is a single-threaded, time-ordered event scheduler: it owns
//! the pending-event list, advances a logical clock by executing the
//! earliest pending event and publishes its lifecycle on a typed event bus.
//! Statistics observers subscribe to timed events and fold them into
//! running summaries.
//!
//! # Overview
//!
//! - [`time`] — the logical clock: [`SimTime`](time::SimTime) instants and
//!   the shared [`Clock`](time::Clock).
//! - [`event`] — scheduled events, priorities and cancellation handles.
//! - [`bus`] — publish/subscribe of typed, optionally timed events.
//! - [`naming`] — the hierarchical context observers bind themselves in.
//! - [`runtime`] — the [`Simulator`](runtime::Simulator) kernel, its
//!   lifecycle state machine and the [`Replication`](runtime::Replication)
//!   run boundaries.
//! - [`stats`] — [`Tally`](stats::Tally), [`Counter`](stats::Counter) and
//!   [`Persistent`](stats::Persistent) statistics observers.
//!
//! # Example
//!
//! ```ignore
//! use descore::prelude::*;
//!
//! struct Queue { stats: StatisticsSet }
//!
//! impl Model for Queue {
//!     fn construct_model(ctx: &mut SimContext<'_, Self>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         let waiting = Tally::new("waiting time", ctx);
//!         ctx.schedule_event_rel(Duration::from_secs(1), NORMAL_PRIORITY, Action::call(move |ctx| {
//!             waiting.register(0.42);
//!             Ok(())
//!         }))?;
//!         Ok(())
//!     }
//!
//!     fn output_statistics(&mut self) -> &mut StatisticsSet {
//!         &mut self.stats
//!     }
//! }
//!
//! let sim = Builder::seeded(42).quiet().build(Queue { stats: StatisticsSet::new() });
//! sim.initialize(Replication::from_run_length(Duration::from_secs(60)))?;
//! sim.start()?;
//! ```
//!

pub mod bus;
pub mod event;
pub mod naming;
pub mod prelude;
pub mod runtime;
pub mod stats;
pub mod time;

mod logger;
pub use logger::SimLogger;
