//! Stress tests designed to break the dispatcher.
//!
//! These tests drive the bus with randomized (but seeded) listener sets and
//! randomized mutation from inside callbacks, then check the ordering
//! guarantees still hold.

#[cfg(test)]
mod stress_tests {
    use crate::core::{Priority, RaiseOutcome, Subscription};
    use crate::engine::EventBus;
    use crate::testing::{CallLog, RecordingSink};
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::Rc;

    const SEEDS: [u64; 8] = [1, 7, 42, 99, 1234, 5150, 65_537, 0xDEAD_BEEF];

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    // ==========================================================================
    // Test Types
    // ==========================================================================

    #[derive(Debug, Clone)]
    struct Ping;

    #[derive(Debug, Clone)]
    struct Step {
        id: usize,
    }

    #[derive(Debug, Clone)]
    struct Dive {
        level: usize,
    }

    fn random_priority(rng: &mut fastrand::Rng) -> Priority {
        rng.i32(-5..=5) as Priority
    }

    // ==========================================================================
    // TEST: Randomized registration order
    // ==========================================================================
    //
    // Many listeners with heavily duplicated priorities. The walk must visit
    // them in non-increasing priority order, and equal priorities in the order
    // they were registered.

    #[test]
    fn test_random_registration_is_sorted_and_stable() {
        init_tracing();
        for seed in SEEDS {
            let mut rng = fastrand::Rng::with_seed(seed);
            let bus = EventBus::new();
            let calls: Rc<RefCell<Vec<(usize, Priority)>>> = Rc::default();

            for label in 0..200 {
                let priority = random_priority(&mut rng);
                let calls = calls.clone();
                bus.subscribe(priority, move |_: &mut Ping, _| {
                    calls.borrow_mut().push((label, priority));
                    Ok(())
                });
            }

            bus.raise(&mut Ping);
            let calls = calls.borrow();
            assert_eq!(calls.len(), 200, "seed {}", seed);
            for pair in calls.windows(2) {
                let ((first_label, first), (second_label, second)) = (pair[0], pair[1]);
                assert!(first >= second, "seed {}: priority rose {:?}", seed, pair);
                if first == second {
                    assert!(
                        first_label < second_label,
                        "seed {}: ties out of registration order {:?}",
                        seed,
                        pair
                    );
                }
            }
        }
    }

    // ==========================================================================
    // TEST: Random subscribe/unsubscribe from inside listeners
    // ==========================================================================
    //
    // Every invocation may add a listener at a random priority or remove a
    // random live listener. After each raise:
    // 1. No listener ran twice
    // 2. Emitted priorities never increased
    // 3. Every listener live at the start and never removed ran
    // 4. Listeners added at or below the running priority ran (unless removed);
    //    listeners added above it did not

    struct Chaos {
        rng: RefCell<fastrand::Rng>,
        live: RefCell<Vec<(usize, Subscription<Ping>)>>,
        removed: RefCell<HashSet<usize>>,
        added: RefCell<Vec<(usize, Priority, Priority)>>,
        calls: RefCell<Vec<(usize, Priority)>>,
        next_label: Cell<usize>,
        budget: Cell<usize>,
    }

    impl Chaos {
        fn new(seed: u64) -> Rc<Self> {
            Rc::new(Self {
                rng: RefCell::new(fastrand::Rng::with_seed(seed)),
                live: RefCell::new(Vec::new()),
                removed: RefCell::new(HashSet::new()),
                added: RefCell::new(Vec::new()),
                calls: RefCell::new(Vec::new()),
                next_label: Cell::new(0),
                budget: Cell::new(0),
            })
        }

        fn reset_round(&self, budget: usize) {
            self.removed.borrow_mut().clear();
            self.added.borrow_mut().clear();
            self.calls.borrow_mut().clear();
            self.budget.set(budget);
        }
    }

    fn add_listener(chaos: &Rc<Chaos>, bus: &EventBus, priority: Priority) -> usize {
        let label = chaos.next_label.get();
        chaos.next_label.set(label + 1);
        let state = Rc::clone(chaos);
        let sub = bus.subscribe(priority, move |_: &mut Ping, bus: &EventBus| {
            on_call(&state, bus, label, priority);
            Ok(())
        });
        chaos.live.borrow_mut().push((label, sub));
        label
    }

    fn on_call(chaos: &Rc<Chaos>, bus: &EventBus, label: usize, priority: Priority) {
        chaos.calls.borrow_mut().push((label, priority));
        if chaos.budget.get() == 0 {
            return;
        }
        chaos.budget.set(chaos.budget.get() - 1);

        let roll = chaos.rng.borrow_mut().u8(0..10);
        match roll {
            0..=3 => {
                let new_priority = random_priority(&mut chaos.rng.borrow_mut());
                let new_label = add_listener(chaos, bus, new_priority);
                chaos
                    .added
                    .borrow_mut()
                    .push((new_label, new_priority, priority));
            }
            4..=6 => {
                let victim = {
                    let mut live = chaos.live.borrow_mut();
                    if live.is_empty() {
                        return;
                    }
                    let index = chaos.rng.borrow_mut().usize(..live.len());
                    live.swap_remove(index)
                };
                assert!(bus.unsubscribe(&victim.1));
                chaos.removed.borrow_mut().insert(victim.0);
            }
            _ => {}
        }
    }

    #[test]
    fn test_random_mutation_during_walk() {
        init_tracing();
        for seed in SEEDS {
            let sink = RecordingSink::new();
            let bus: EventBus = EventBus::builder().with_failure_sink(sink.clone()).build();
            let chaos = Chaos::new(seed);
            for _ in 0..40 {
                let priority = random_priority(&mut chaos.rng.borrow_mut());
                add_listener(&chaos, &bus, priority);
            }

            for round in 0..10 {
                let before: Vec<usize> = chaos.live.borrow().iter().map(|(l, _)| *l).collect();
                chaos.reset_round(60);

                bus.raise(&mut Ping);

                let calls = chaos.calls.borrow();
                let removed = chaos.removed.borrow();
                let called: HashSet<usize> = calls.iter().map(|(l, _)| *l).collect();

                assert_eq!(
                    called.len(),
                    calls.len(),
                    "seed {} round {}: a listener ran twice",
                    seed,
                    round
                );
                for pair in calls.windows(2) {
                    assert!(
                        pair[0].1 >= pair[1].1,
                        "seed {} round {}: priority rose {:?}",
                        seed,
                        round,
                        pair
                    );
                }
                for label in &before {
                    if !removed.contains(label) {
                        assert!(
                            called.contains(label),
                            "seed {} round {}: listener {} was skipped",
                            seed,
                            round,
                            label
                        );
                    }
                }
                for &(label, priority, at) in chaos.added.borrow().iter() {
                    if priority > at {
                        assert!(
                            !called.contains(&label),
                            "seed {} round {}: listener {} added ahead of the cursor ran",
                            seed,
                            round,
                            label
                        );
                    } else if !removed.contains(&label) {
                        assert!(
                            called.contains(&label),
                            "seed {} round {}: listener {} added behind the cursor was skipped",
                            seed,
                            round,
                            label
                        );
                    }
                }
            }

            assert_eq!(bus.listener_count::<Ping>(), chaos.live.borrow().len());
            assert!(sink.is_empty(), "seed {}: {:?}", seed, sink.faults());
        }
    }

    // ==========================================================================
    // TEST: Deferred raises form a FIFO across nesting
    // ==========================================================================
    //
    // Each Step listener queues a random number of child steps. Ids are handed
    // out when a step is queued, so FIFO draining dispatches steps in exactly
    // increasing id order.

    #[test]
    fn test_deferred_cascade_is_fifo() {
        init_tracing();
        for seed in SEEDS {
            let sink = RecordingSink::new();
            let bus: EventBus = EventBus::builder().with_failure_sink(sink.clone()).build();
            let rng = Rc::new(RefCell::new(fastrand::Rng::with_seed(seed)));
            let next_id = Rc::new(Cell::new(1_usize));
            let order: Rc<RefCell<Vec<usize>>> = Rc::default();

            for _ in 0..2 {
                let rng = rng.clone();
                let next_id = next_id.clone();
                let order = order.clone();
                bus.subscribe(0.0, move |step: &mut Step, bus: &EventBus| {
                    order.borrow_mut().push(step.id);
                    let children = rng.borrow_mut().usize(0..3);
                    for _ in 0..children {
                        if next_id.get() >= 300 {
                            break;
                        }
                        let id = next_id.get();
                        next_id.set(id + 1);
                        assert_eq!(bus.raise(&mut Step { id }), RaiseOutcome::Deferred);
                    }
                    Ok(())
                });
            }

            bus.raise(&mut Step { id: 0 });

            let order = order.borrow();
            let mut dispatched: Vec<usize> = order.iter().copied().collect();
            dispatched.dedup();
            let expected: Vec<usize> = (0..next_id.get()).collect();
            assert_eq!(dispatched, expected, "seed {}", seed);
            assert_eq!(order.len(), expected.len() * 2, "seed {}", seed);
            assert_eq!(bus.pending_count(), 0);
            assert_eq!(bus.stats().deferred as usize, expected.len() - 1);
            assert!(sink.is_empty(), "seed {}: {:?}", seed, sink.faults());
        }
    }

    // ==========================================================================
    // TEST: Consumption at random depths
    // ==========================================================================
    //
    // A chain of immediate raises, one per level. A random subset of levels
    // consumes its event; only those levels lose their trailing listener.

    #[test]
    fn test_consumption_is_scoped_to_its_depth() {
        init_tracing();
        const LEVELS: usize = 12;
        for seed in SEEDS {
            let mut rng = fastrand::Rng::with_seed(seed);
            let plan: Rc<Vec<bool>> = Rc::new((0..LEVELS).map(|_| rng.bool()).collect());
            let outcomes: Rc<RefCell<Vec<(usize, RaiseOutcome)>>> = Rc::default();
            let log = CallLog::new();
            let sink = RecordingSink::new();
            let bus: EventBus = EventBus::builder().with_failure_sink(sink.clone()).build();

            {
                let outcomes = outcomes.clone();
                bus.subscribe(10.0, move |dive: &mut Dive, bus: &EventBus| {
                    if dive.level + 1 < LEVELS {
                        let level = dive.level + 1;
                        let outcome = bus.raise_immediately(&mut Dive { level });
                        outcomes.borrow_mut().push((level, outcome));
                    }
                    Ok(())
                });
            }
            {
                let plan = plan.clone();
                bus.subscribe(0.0, move |dive: &mut Dive, bus: &EventBus| {
                    assert_eq!(bus.depth(), dive.level + 1);
                    if plan[dive.level] {
                        bus.consume_current_event()?;
                    }
                    Ok(())
                });
            }
            {
                let log = log.clone();
                bus.subscribe(-10.0, move |dive: &mut Dive, _| {
                    log.record(dive.level.to_string());
                    Ok(())
                });
            }

            let root = bus.raise(&mut Dive { level: 0 });
            assert_eq!(root.is_consumed(), plan[0], "seed {}", seed);

            for (level, outcome) in outcomes.borrow().iter() {
                assert_eq!(outcome.is_consumed(), plan[*level], "seed {}", seed);
            }
            let expected: Vec<String> = (0..LEVELS)
                .rev()
                .filter(|level| !plan[*level])
                .map(|level| level.to_string())
                .collect();
            assert_eq!(log.entries(), expected, "seed {}", seed);
            assert!(sink.is_empty(), "seed {}: {:?}", seed, sink.faults());
        }
    }

    // ==========================================================================
    // TEST: Faults under load
    // ==========================================================================
    //
    // Randomly failing and panicking listeners must never stop the walk or
    // leave the bus raising.

    #[test]
    fn test_random_faults_never_stop_dispatch() {
        init_tracing();
        for seed in SEEDS {
            let mut rng = fastrand::Rng::with_seed(seed);
            let sink = RecordingSink::new();
            let bus: EventBus = EventBus::builder().with_failure_sink(sink.clone()).build();
            let ran = Rc::new(Cell::new(0_usize));
            let mut expected_faults = 0;

            for _ in 0..50 {
                let mode = rng.u8(0..4);
                if mode >= 2 {
                    expected_faults += 1;
                }
                let ran = ran.clone();
                bus.subscribe(random_priority(&mut rng), move |_: &mut Ping, _| {
                    ran.set(ran.get() + 1);
                    match mode {
                        2 => Err(anyhow::anyhow!("mode {}", mode)),
                        3 => panic!("mode {}", mode),
                        _ => Ok(()),
                    }
                });
            }

            assert_eq!(bus.raise(&mut Ping), RaiseOutcome::Delivered);
            assert_eq!(ran.get(), 50, "seed {}", seed);
            assert_eq!(sink.len(), expected_faults, "seed {}", seed);
            assert_eq!(bus.stats().listener_faults as usize, expected_faults);
            assert!(!bus.is_raising());
        }
    }
}
