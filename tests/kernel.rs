use descore::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A model that records which labels executed at which instant.
#[derive(Default)]
struct Recorder {
    log: Vec<(SimTime, &'static str)>,
    stats: StatisticsSet,
}

impl Model for Recorder {
    fn construct_model(_ctx: &mut SimContext<'_, Self>) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn output_statistics(&mut self) -> &mut StatisticsSet {
        &mut self.stats
    }
}

fn mark(label: &'static str) -> Action<Recorder> {
    Action::call(move |ctx: &mut SimContext<'_, Recorder>| {
        let now = ctx.sim_time();
        ctx.model.log.push((now, label));
        Ok(())
    })
}

fn replication(warmup: f64, end: f64) -> Replication {
    Replication::new(SimTime::ZERO, SimTime::from(warmup), SimTime::from(end)).unwrap()
}

fn sim() -> Simulator<Recorder> {
    Builder::seeded(1).quiet().build(Recorder::default())
}

/// Records every published event of the subscribed types.
struct BusLog {
    seen: Mutex<Vec<(&'static str, Option<SimTime>)>>,
}

impl BusLog {
    fn install(bus: &EventBus, types: &[&'static EventType]) -> Arc<BusLog> {
        let log = Arc::new(BusLog {
            seen: Mutex::new(Vec::new()),
        });
        for &ty in types {
            bus.subscribe_strong(ty, log.clone());
        }
        log
    }

    fn timestamps(&self, name: &str) -> Vec<SimTime> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| *n == name)
            .filter_map(|(_, t)| *t)
            .collect()
    }
}

impl Subscriber for BusLog {
    fn notify(&self, event: &BusEvent) -> NotifyResult {
        self.seen
            .lock()
            .unwrap()
            .push((event.event_type().name(), event.timestamp()));
        Ok(())
    }
}

#[test]
fn fifo_order_at_equal_time_and_priority() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    let t = SimTime::from(5.0);
    sim.schedule_event(t, NORMAL_PRIORITY, mark("A")).unwrap();
    sim.schedule_event(t, NORMAL_PRIORITY, mark("B")).unwrap();
    sim.schedule_event(t, NORMAL_PRIORITY, mark("C")).unwrap();

    sim.start().unwrap();

    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(t, "A"), (t, "B"), (t, "C")]
    );
    assert_eq!(sim.sim_time(), SimTime::from(10.0));
    assert_eq!(sim.run_state(), RunState::Ended);
}

#[test]
fn higher_priority_fires_first_at_equal_time() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    let t = SimTime::from(3.0);
    sim.schedule_event(t, NORMAL_PRIORITY, mark("X")).unwrap();
    sim.schedule_event(t, NORMAL_PRIORITY + 1, mark("Y")).unwrap();

    sim.start().unwrap();

    assert_eq!(sim.with_model(|m| m.log.clone()), vec![(t, "Y"), (t, "X")]);
}

#[test]
fn warmup_fires_before_user_events_at_the_same_instant() {
    let sim = sim();
    let log = BusLog::install(sim.bus(), &[&WARMUP_EVENT]);

    let warmed_up = Arc::new(AtomicBool::new(false));
    struct WarmupFlag(Arc<AtomicBool>);
    impl Subscriber for WarmupFlag {
        fn notify(&self, _event: &BusEvent) -> NotifyResult {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }
    sim.bus()
        .subscribe_strong(&WARMUP_EVENT, Arc::new(WarmupFlag(warmed_up.clone())));

    sim.initialize(replication(2.0, 10.0)).unwrap();

    let flag = warmed_up.clone();
    sim.schedule_event(
        SimTime::from(2.0),
        MAX_PRIORITY,
        Action::call(move |ctx: &mut SimContext<'_, Recorder>| {
            let label = if flag.load(Ordering::SeqCst) {
                "after warmup"
            } else {
                "before warmup"
            };
            ctx.model.log.push((ctx.sim_time(), label));
            Ok(())
        }),
    )
    .unwrap();

    sim.start().unwrap();

    assert_eq!(log.timestamps("WARMUP_EVENT"), vec![SimTime::from(2.0)]);
    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(SimTime::from(2.0), "after warmup")]
    );
}

#[test]
fn end_replication_fires_after_user_events_at_the_same_instant() {
    let sim = sim();
    let log = BusLog::install(sim.bus(), &[&END_REPLICATION_EVENT]);

    sim.initialize(replication(0.0, 10.0)).unwrap();
    sim.schedule_event(SimTime::from(10.0), MIN_PRIORITY, mark("late"))
        .unwrap();

    sim.start().unwrap();

    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(SimTime::from(10.0), "late")]
    );
    assert_eq!(
        log.timestamps("END_REPLICATION_EVENT"),
        vec![SimTime::from(10.0)]
    );
    assert_eq!(sim.run_state(), RunState::Ended);
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn run_until_excluding_leaves_boundary_events_pending() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    sim.schedule_event(SimTime::from(5.0), NORMAL_PRIORITY, mark("five"))
        .unwrap();
    let seven = sim
        .schedule_event(SimTime::from(7.0), NORMAL_PRIORITY, mark("seven"))
        .unwrap();

    sim.run_until(SimTime::from(7.0), false).unwrap();

    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(SimTime::from(5.0), "five")]
    );
    assert_eq!(sim.sim_time(), SimTime::from(7.0));
    assert_eq!(sim.run_state(), RunState::Stopped);
    assert_eq!(seven.state(), EventState::Pending);

    // Resuming runs the boundary event and the rest of the replication.
    sim.start().unwrap();
    assert_eq!(sim.run_state(), RunState::Ended);
    assert_eq!(seven.state(), EventState::Executed);
}

#[test]
fn cancelled_event_never_executes() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    let victim = sim
        .schedule_event(SimTime::from(4.0), NORMAL_PRIORITY, mark("victim"))
        .unwrap();

    let handle = victim.clone();
    sim.schedule_event(
        SimTime::from(2.0),
        NORMAL_PRIORITY,
        Action::call(move |ctx: &mut SimContext<'_, Recorder>| {
            assert!(ctx.cancel_event(&handle));
            ctx.model.log.push((ctx.sim_time(), "cancelled it"));
            Ok(())
        }),
    )
    .unwrap();

    sim.start().unwrap();

    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(SimTime::from(2.0), "cancelled it")]
    );
    assert_eq!(victim.state(), EventState::Cancelled);
    assert_eq!(sim.run_state(), RunState::Ended);
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn schedule_now_fires_at_the_current_instant() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    sim.schedule_event(
        SimTime::from(2.0),
        NORMAL_PRIORITY,
        Action::call(|ctx: &mut SimContext<'_, Recorder>| {
            ctx.model.log.push((ctx.sim_time(), "first"));
            ctx.schedule_event_now(NORMAL_PRIORITY, mark("follow-up"))?;
            Ok(())
        }),
    )
    .unwrap();

    sim.start().unwrap();

    let t = SimTime::from(2.0);
    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(t, "first"), (t, "follow-up")]
    );
}

#[test]
fn scheduling_in_the_past_fails() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();
    sim.run_until(SimTime::from(5.0), true).unwrap();

    let err = sim.schedule_event(SimTime::from(3.0), NORMAL_PRIORITY, mark("too late"));
    assert!(matches!(err, Err(SimError::ScheduleInPast { .. })));

    // The current instant is still fine.
    assert!(sim
        .schedule_event(SimTime::from(5.0), NORMAL_PRIORITY, mark("now"))
        .is_ok());
}

#[test]
fn reserved_priorities_are_rejected() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    for priority in [MIN_PRIORITY - 1, MAX_PRIORITY + 1] {
        let err = sim.schedule_event(SimTime::from(1.0), priority, mark("nope"));
        assert!(matches!(err, Err(SimError::PriorityOutOfRange(_))));
    }
}

#[test]
fn initialize_clears_previous_events() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();
    let stale = sim
        .schedule_event(SimTime::from(5.0), NORMAL_PRIORITY, mark("stale"))
        .unwrap();

    sim.initialize(replication(0.0, 8.0)).unwrap();

    // Only the two control events of the fresh replication remain.
    assert_eq!(sim.pending_events(), 2);
    assert_eq!(stale.state(), EventState::Cancelled);

    sim.start().unwrap();
    assert!(sim.with_model(|m| m.log.is_empty()));
    assert_eq!(sim.sim_time(), SimTime::from(8.0));
}

#[test]
fn lifecycle_guards_reject_misuse() {
    let sim = sim();

    assert!(matches!(sim.step(), Err(SimError::IllegalState(_))));
    assert!(matches!(sim.start(), Err(SimError::IllegalState(_))));
    assert!(matches!(
        sim.schedule_event(SimTime::from(1.0), NORMAL_PRIORITY, mark("early")),
        Err(SimError::IllegalState(RunState::Initial))
    ));

    sim.initialize(replication(0.0, 10.0)).unwrap();
    assert!(matches!(sim.stop(), Err(SimError::IllegalState(_))));

    sim.start().unwrap();
    assert_eq!(sim.run_state(), RunState::Ended);
    assert!(matches!(sim.start(), Err(SimError::IllegalState(RunState::Ended))));
}

#[test]
fn step_advances_one_event_at_a_time() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();
    sim.schedule_event(SimTime::from(1.0), NORMAL_PRIORITY, mark("one"))
        .unwrap();

    // First step pops the warmup control event at t=0.
    sim.step().unwrap();
    assert_eq!(sim.event_count(), 1);
    assert_eq!(sim.sim_time(), SimTime::ZERO);
    assert_eq!(sim.run_state(), RunState::Stopped);

    sim.step().unwrap();
    assert_eq!(sim.event_count(), 2);
    assert_eq!(sim.sim_time(), SimTime::from(1.0));
    assert_eq!(sim.with_model(|m| m.log.clone()), vec![(SimTime::from(1.0), "one")]);

    // Third step pops the end-replication control event.
    sim.step().unwrap();
    assert_eq!(sim.run_state(), RunState::Ended);
}

#[test]
fn time_changed_fires_once_per_new_instant() {
    let sim = sim();
    let log = BusLog::install(sim.bus(), &[&TIME_CHANGED_EVENT]);

    sim.initialize(replication(0.0, 10.0)).unwrap();
    let t = SimTime::from(5.0);
    sim.schedule_event(t, NORMAL_PRIORITY, mark("a")).unwrap();
    sim.schedule_event(t, NORMAL_PRIORITY, mark("b")).unwrap();

    sim.start().unwrap();

    // The warmup event at t=0 does not move the clock; the user events
    // share one announcement; the end event makes the second one.
    assert_eq!(
        log.timestamps("TIME_CHANGED_EVENT"),
        vec![SimTime::from(5.0), SimTime::from(10.0)]
    );
}

#[test]
fn start_and_stop_events_frame_a_bounded_run() {
    let sim = sim();
    let log = BusLog::install(sim.bus(), &[&START_EVENT, &STOP_EVENT]);

    sim.initialize(replication(0.0, 10.0)).unwrap();
    sim.run_until(SimTime::from(4.0), true).unwrap();

    assert_eq!(log.timestamps("START_EVENT"), vec![SimTime::ZERO]);
    assert_eq!(log.timestamps("STOP_EVENT"), vec![SimTime::from(4.0)]);
}

#[test]
fn relative_scheduling_overflow_is_reported() {
    let sim = sim();
    sim.initialize(
        Replication::new(SimTime::from(1.0), SimTime::from(1.0), SimTime::MAX).unwrap(),
    )
    .unwrap();

    let err = sim.schedule_event_rel(Duration::MAX, NORMAL_PRIORITY, mark("never"));
    assert!(matches!(err, Err(SimError::TimeOverflow)));
}

#[test]
fn event_fault_pauses_the_run_by_default() {
    let sim = sim();
    sim.initialize(replication(0.0, 10.0)).unwrap();

    sim.schedule_event(
        SimTime::from(2.0),
        NORMAL_PRIORITY,
        Action::call(|_| Err("boom".into())),
    )
    .unwrap();
    sim.schedule_event(SimTime::from(3.0), NORMAL_PRIORITY, mark("survivor"))
        .unwrap();

    sim.start().unwrap();

    assert_eq!(sim.run_state(), RunState::Stopped);
    assert!(sim.with_model(|m| m.log.is_empty()));

    // Resuming picks up behind the faulty event.
    sim.start().unwrap();
    assert_eq!(sim.run_state(), RunState::Ended);
    assert_eq!(
        sim.with_model(|m| m.log.clone()),
        vec![(SimTime::from(3.0), "survivor")]
    );
}

#[test]
fn event_fault_strategies_continue_or_end() {
    let sim = Builder::seeded(1)
        .quiet()
        .error_strategy(ErrorStrategy::LogAndContinue)
        .build(Recorder::default());
    sim.initialize(replication(0.0, 10.0)).unwrap();
    sim.schedule_event(
        SimTime::from(2.0),
        NORMAL_PRIORITY,
        Action::call(|_| Err("boom".into())),
    )
    .unwrap();
    sim.schedule_event(SimTime::from(3.0), NORMAL_PRIORITY, mark("survivor"))
        .unwrap();
    sim.start().unwrap();
    assert_eq!(sim.run_state(), RunState::Ended);
    assert_eq!(sim.with_model(|m| m.log.len()), 1);

    let sim = Builder::seeded(1)
        .quiet()
        .error_strategy(ErrorStrategy::WarnAndEnd)
        .build(Recorder::default());
    sim.initialize(replication(0.0, 10.0)).unwrap();
    sim.schedule_event(
        SimTime::from(2.0),
        NORMAL_PRIORITY,
        Action::call(|_| Err("boom".into())),
    )
    .unwrap();
    sim.schedule_event(SimTime::from(3.0), NORMAL_PRIORITY, mark("never"))
        .unwrap();
    sim.start().unwrap();
    assert_eq!(sim.run_state(), RunState::Ended);
    assert_eq!(sim.pending_events(), 0);
    assert!(sim.with_model(|m| m.log.is_empty()));
}

/// A model that records opaque ids, for bulk ordering checks.
#[derive(Default)]
struct OrderModel {
    seen: Vec<(SimTime, usize)>,
    stats: StatisticsSet,
}

impl Model for OrderModel {
    fn construct_model(_ctx: &mut SimContext<'_, Self>) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }

    fn output_statistics(&mut self) -> &mut StatisticsSet {
        &mut self.stats
    }
}

#[test]
fn bulk_insertion_order_is_recovered() {
    let mut rng = StdRng::seed_from_u64(123);

    let mut time = SimTime::ZERO;
    let mut events = Vec::with_capacity(128);
    for id in 0..128_usize {
        time += rng.gen::<f64>() + 0.001;
        events.push((time, id));
    }
    let end = time + 1.0;
    events.shuffle(&mut rng);

    let sim = Builder::seeded(123).quiet().build(OrderModel::default());
    sim.initialize(Replication::new(SimTime::ZERO, SimTime::ZERO, end).unwrap())
        .unwrap();

    for (time, id) in events {
        sim.schedule_event(
            time,
            NORMAL_PRIORITY,
            Action::call(move |ctx: &mut SimContext<'_, OrderModel>| {
                let now = ctx.sim_time();
                ctx.model.seen.push((now, id));
                Ok(())
            }),
        )
        .unwrap();
    }

    sim.start().unwrap();

    let seen = sim.with_model(|m| m.seen.clone());
    assert_eq!(seen.len(), 128);
    // Ids were assigned in increasing-time order, so execution must
    // recover them; and the clock never moves backwards.
    assert!(seen.windows(2).all(|w| w[0].1 < w[1].1));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn external_stop_pauses_between_events() {
    let sim = Arc::new(Builder::seeded(7).quiet().build(Recorder::default()));
    sim.initialize(
        Replication::new(SimTime::ZERO, SimTime::ZERO, SimTime::MAX).unwrap(),
    )
    .unwrap();

    // A self-rescheduling event chain that would run forever.
    fn tick() -> Action<Recorder> {
        Action::call(|ctx| {
            ctx.schedule_event_rel(Duration::from_millis(1), NORMAL_PRIORITY, tick())?;
            Ok(())
        })
    }
    sim.schedule_event(SimTime::ZERO, NORMAL_PRIORITY, tick())
        .unwrap();

    let runner = {
        let sim = sim.clone();
        std::thread::spawn(move || sim.start())
    };

    std::thread::sleep(std::time::Duration::from_millis(20));
    loop {
        match sim.stop() {
            Ok(()) => break,
            // The run may not have reached `Started` yet.
            Err(SimError::IllegalState(RunState::Stopped)) => break,
            Err(_) => std::thread::yield_now(),
        }
    }

    runner.join().unwrap().unwrap();
    assert_eq!(sim.run_state(), RunState::Stopped);
    assert!(sim.pending_events() > 0);
}
