//! End-to-end kernel scenarios.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{Context, EventId, QueueKind, SimConfig, SimState, Simulator, Time};

type Log<T> = Rc<RefCell<Vec<T>>>;

fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

fn ns(n: i64) -> Time {
    Time::from_nanos(n)
}

/// Schedule a callback that records `(label, now)`.
fn record(sim: &mut Simulator, log: &Log<(&'static str, Time)>, label: &'static str, delay: Time) -> EventId {
    let log = log.clone();
    sim.schedule(delay, move |sim| log.borrow_mut().push((label, sim.now())))
}

#[test]
fn test_events_fire_in_time_order() {
    for kind in QueueKind::ALL {
        let mut sim = Simulator::with_config(SimConfig::default().with_queue(kind));
        let fired = log();
        record(&mut sim, &fired, "A", ns(5));
        record(&mut sim, &fired, "B", ns(5));
        record(&mut sim, &fired, "C", ns(3));
        sim.run();

        assert_eq!(
            *fired.borrow(),
            vec![("C", ns(3)), ("A", ns(5)), ("B", ns(5))],
            "queue {kind}"
        );
        assert_eq!(sim.now(), ns(5));
        assert_eq!(sim.event_count(), 3);
        assert_eq!(sim.state(), SimState::Stopped);
    }
}

#[test]
fn test_zero_delay_and_equal_time_ties() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "X", ns(10));
    let now_event = fired.clone();
    sim.schedule_now(move |sim| now_event.borrow_mut().push(("Y", sim.now())));
    record(&mut sim, &fired, "Z", ns(10));
    sim.run();

    assert_eq!(
        *fired.borrow(),
        vec![("Y", Time::ZERO), ("X", ns(10)), ("Z", ns(10))]
    );
}

#[test]
fn test_nested_scheduling_end_to_end() {
    // X at 10 schedules Y after 0 and Z after 5; Y runs before Z.
    let mut sim = Simulator::new();
    let fired = log();

    let outer = fired.clone();
    sim.schedule(ns(10), move |sim| {
        outer.borrow_mut().push(("X", sim.now()));
        record(sim, &outer, "Y", Time::ZERO);
        record(sim, &outer, "Z", ns(5));
    });
    sim.run();

    assert_eq!(
        *fired.borrow(),
        vec![("X", ns(10)), ("Y", ns(10)), ("Z", ns(15))]
    );
}

#[test]
fn test_schedule_now_is_deferred() {
    let mut sim = Simulator::new();
    let fired = log();

    let outer = fired.clone();
    sim.schedule(ns(1), move |sim| {
        let inner = outer.clone();
        sim.schedule_now(move |_| inner.borrow_mut().push("inner"));
        outer.borrow_mut().push("outer done");
    });
    sim.run();

    assert_eq!(*fired.borrow(), vec!["outer done", "inner"]);
}

#[test]
fn test_schedule_now_after_same_time_events() {
    let mut sim = Simulator::new();
    let fired = log();

    let first = fired.clone();
    sim.schedule(ns(4), move |sim| {
        let now_event = first.clone();
        sim.schedule_now(move |sim| now_event.borrow_mut().push(("now", sim.now())));
    });
    record(&mut sim, &fired, "peer", ns(4));
    sim.run();

    assert_eq!(*fired.borrow(), vec![("peer", ns(4)), ("now", ns(4))]);
}

#[test]
fn test_cancel_prevents_firing() {
    let mut sim = Simulator::new();
    let fired = log();
    let a = record(&mut sim, &fired, "A", ns(1));
    record(&mut sim, &fired, "B", ns(2));

    assert!(!sim.is_expired(a));
    sim.cancel(a);
    assert!(sim.is_expired(a));
    assert_eq!(sim.pending_count(), 1);

    // Idempotent.
    sim.cancel(a);
    assert_eq!(sim.pending_count(), 1);

    sim.run();
    assert_eq!(*fired.borrow(), vec![("B", ns(2))]);
}

#[test]
fn test_cancel_after_fire_is_noop() {
    let mut sim = Simulator::new();
    let fired = log();
    let a = record(&mut sim, &fired, "A", ns(1));
    sim.run();
    assert!(sim.is_expired(a));
    sim.cancel(a);
    sim.remove(a);
    assert_eq!(*fired.borrow(), vec![("A", ns(1))]);
}

#[test]
fn test_cancel_from_inside_callback() {
    let mut sim = Simulator::new();
    let fired = log();
    let victim = record(&mut sim, &fired, "victim", ns(5));

    sim.schedule(ns(2), move |sim| sim.cancel(victim));
    sim.run();

    assert!(fired.borrow().is_empty());
    assert_eq!(sim.now(), ns(2));
}

#[test]
fn test_remove_is_eager() {
    let mut sim = Simulator::with_config(SimConfig::default().with_queue(QueueKind::List));
    let fired = log();
    let a = record(&mut sim, &fired, "A", ns(3));
    let b = record(&mut sim, &fired, "B", ns(3));
    record(&mut sim, &fired, "C", ns(3));

    sim.remove(b);
    assert!(sim.is_expired(b));
    sim.cancel(a);
    // Removing a cancelled event is fine and does not double count.
    sim.remove(a);
    assert_eq!(sim.pending_count(), 1);

    sim.run();
    assert_eq!(*fired.borrow(), vec![("C", ns(3))]);
}

#[test]
fn test_invalid_handle_is_expired() {
    let mut sim = Simulator::new();
    let id = EventId::default();
    assert!(!id.is_valid());
    assert!(sim.is_expired(id));
    assert_eq!(sim.delay_left(id), Time::ZERO);
    sim.cancel(id);
    sim.remove(id);
}

#[test]
fn test_stale_handle_after_slot_reuse() {
    let mut sim = Simulator::new();
    let fired = log();
    let old = record(&mut sim, &fired, "old", ns(1));
    sim.run();

    // The new event reuses the freed slot; the old handle must not reach it.
    let new = record(&mut sim, &fired, "new", ns(1));
    assert!(sim.is_expired(old));
    assert!(!sim.is_expired(new));
    sim.cancel(old);
    assert!(!sim.is_expired(new));

    sim.run();
    assert_eq!(*fired.borrow(), vec![("old", ns(1)), ("new", ns(2))]);
}

#[test]
fn test_delay_left() {
    let mut sim = Simulator::new();
    let id = sim.schedule(ns(100), |_| {});
    sim.schedule(ns(30), move |sim| {
        assert_eq!(sim.delay_left(id), ns(70));
    });
    assert_eq!(sim.delay_left(id), ns(100));
    sim.run();
    assert_eq!(sim.delay_left(id), Time::ZERO);
}

#[test]
fn test_handle_carries_time_and_context() {
    let mut sim = Simulator::new();
    let id = sim.schedule_with_context(Context::new(4), ns(9), |_| {});
    assert_eq!(id.time(), ns(9));
    assert_eq!(id.context(), Context::new(4));
    assert!(id.uid() > 0);
}

#[test]
fn test_uids_increase() {
    let mut sim = Simulator::new();
    let a = sim.schedule(ns(5), |_| {});
    let b = sim.schedule(ns(1), |_| {});
    let c = sim.schedule_destroy(|_| {});
    assert!(a.uid() < b.uid());
    assert!(b.uid() < c.uid());
}

#[test]
fn test_context_is_attributed_and_restored() {
    let mut sim = Simulator::new();
    let seen = log();
    assert_eq!(sim.context(), Context::NONE);

    let outer = seen.clone();
    sim.schedule_with_context(Context::new(7), ns(1), move |sim| {
        outer.borrow_mut().push(("explicit", sim.context()));
        // Inherits 7.
        let inherited = outer.clone();
        sim.schedule(ns(1), move |sim| inherited.borrow_mut().push(("inherited", sim.context())));
        // Explicit target.
        let other = outer.clone();
        sim.schedule_with_context(Context::new(2), ns(1), move |sim| {
            other.borrow_mut().push(("other", sim.context()))
        });
    });
    let top = seen.clone();
    sim.schedule(ns(5), move |sim| top.borrow_mut().push(("top", sim.context())));

    sim.run();
    assert_eq!(
        *seen.borrow(),
        vec![
            ("explicit", Context::new(7)),
            ("inherited", Context::new(7)),
            ("other", Context::new(2)),
            ("top", Context::NONE),
        ]
    );
    assert_eq!(sim.context(), Context::NONE);
}

#[test]
fn test_stop_and_resume() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "A", ns(1));
    sim.schedule(ns(2), |sim| sim.stop());
    record(&mut sim, &fired, "B", ns(2));
    record(&mut sim, &fired, "C", ns(3));

    sim.run();
    // Stop takes effect after the current callback; B at the same time waits.
    assert_eq!(*fired.borrow(), vec![("A", ns(1))]);
    assert_eq!(sim.now(), ns(2));
    assert_eq!(sim.state(), SimState::Stopped);
    assert!(sim.is_finished());

    sim.run();
    assert_eq!(*fired.borrow(), vec![("A", ns(1)), ("B", ns(2)), ("C", ns(3))]);
}

#[test]
fn test_stop_outside_run_is_ignored() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "A", ns(1));
    sim.stop();
    sim.run();
    assert_eq!(fired.borrow().len(), 1);
}

#[test]
fn test_stop_at() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "A", ns(10));
    record(&mut sim, &fired, "B", ns(30));
    sim.stop_at(ns(20));

    sim.run();
    assert_eq!(*fired.borrow(), vec![("A", ns(10))]);
    assert_eq!(sim.now(), ns(20));
    assert_eq!(sim.pending_count(), 1);
}

#[test]
fn test_stop_after_from_config() {
    let mut sim = Simulator::with_config(SimConfig::default().with_stop_at(ns(15)));
    let fired = log();
    record(&mut sim, &fired, "A", ns(10));
    record(&mut sim, &fired, "B", ns(20));

    sim.run();
    assert_eq!(*fired.borrow(), vec![("A", ns(10))]);

    sim.stop_after(ns(100));
    sim.run();
    assert_eq!(*fired.borrow(), vec![("A", ns(10)), ("B", ns(20))]);
    assert_eq!(sim.now(), ns(115));
}

#[test]
fn test_run_until() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "A", ns(5));
    record(&mut sim, &fired, "B", ns(10));
    record(&mut sim, &fired, "C", ns(11));

    sim.run_until(ns(10));
    assert_eq!(*fired.borrow(), vec![("A", ns(5)), ("B", ns(10))]);
    assert_eq!(sim.now(), ns(10));

    sim.run_until(ns(50));
    assert_eq!(sim.now(), ns(50));
    assert_eq!(fired.borrow().len(), 3);
}

#[test]
fn test_run_until_skips_cancelled_head() {
    let mut sim = Simulator::new();
    let fired = log();
    let a = record(&mut sim, &fired, "A", ns(5));
    record(&mut sim, &fired, "B", ns(20));
    sim.cancel(a);

    sim.run_until(ns(10));
    assert!(fired.borrow().is_empty());
    assert_eq!(sim.now(), ns(10));
}

#[test]
fn test_step() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "A", ns(1));
    record(&mut sim, &fired, "B", ns(2));

    assert!(sim.step());
    assert_eq!(sim.now(), ns(1));
    assert!(sim.step());
    assert!(!sim.step());
    assert_eq!(fired.borrow().len(), 2);
}

#[test]
fn test_max_events() {
    let mut sim = Simulator::with_config(SimConfig::default().with_max_events(2));
    let fired = log();
    for (label, t) in [("A", 1), ("B", 2), ("C", 3)] {
        record(&mut sim, &fired, label, ns(t));
    }
    sim.run();
    assert_eq!(fired.borrow().len(), 2);
    assert_eq!(sim.pending_count(), 1);
    assert_eq!(sim.summary().events_processed, 2);
}

#[test]
fn test_schedule_at() {
    let mut sim = Simulator::new();
    let fired = log();
    sim.schedule(ns(10), {
        let fired = fired.clone();
        move |sim| {
            let inner = fired.clone();
            sim.schedule_at(ns(25), move |sim| inner.borrow_mut().push(("at", sim.now())));
        }
    });
    sim.run();
    assert_eq!(*fired.borrow(), vec![("at", ns(25))]);
}

#[test]
fn test_try_schedule_reports_errors() {
    let mut sim = Simulator::new();
    sim.schedule(ns(10), |_| {});
    sim.run();

    assert!(matches!(
        sim.try_schedule(ns(-1), |_| {}),
        Err(crate::SimError::NegativeDelay { .. })
    ));
    assert!(matches!(
        sim.try_schedule_at(ns(5), |_| {}),
        Err(crate::SimError::InPast { .. })
    ));
    assert!(matches!(
        sim.try_schedule(Time::MAX, |_| {}),
        Err(crate::SimError::TimeOverflow { .. })
    ));
    assert_eq!(sim.pending_count(), 0);

    sim.destroy();
    assert_eq!(
        sim.try_schedule(ns(1), |_| {}),
        Err(crate::SimError::Destroyed)
    );
}

#[test]
#[should_panic(expected = "negative delay")]
fn test_negative_delay_panics() {
    let mut sim = Simulator::new();
    sim.schedule(ns(-5), |_| {});
}

#[test]
#[should_panic(expected = "has been destroyed")]
fn test_schedule_after_destroy_panics() {
    let mut sim = Simulator::new();
    sim.destroy();
    sim.schedule(ns(1), |_| {});
}

#[test]
#[should_panic(expected = "has been destroyed")]
fn test_run_after_destroy_panics() {
    let mut sim = Simulator::new();
    sim.destroy();
    sim.run();
}

#[test]
#[should_panic(expected = "in the past")]
fn test_run_until_past_panics() {
    let mut sim = Simulator::new();
    sim.run_until(ns(10));
    sim.run_until(ns(5));
}

#[test]
fn test_destroy_discards_pending_and_runs_destroy_events_lifo() {
    let mut sim = Simulator::new();
    let fired = log();
    record(&mut sim, &fired, "never", ns(100));

    for label in ["first", "second", "third"] {
        let fired = fired.clone();
        sim.schedule_destroy(move |sim| fired.borrow_mut().push((label, sim.now())));
    }
    sim.run_until(ns(10));
    sim.destroy();

    assert_eq!(
        *fired.borrow(),
        vec![("third", ns(10)), ("second", ns(10)), ("first", ns(10))]
    );
    assert_eq!(sim.state(), SimState::Destroyed);
    assert_eq!(sim.pending_count(), 0);

    // Second destroy is a no-op.
    sim.destroy();
    assert_eq!(fired.borrow().len(), 3);
}

#[test]
fn test_cancelled_destroy_event_does_not_run() {
    let mut sim = Simulator::new();
    let fired = log();
    let keep = fired.clone();
    sim.schedule_destroy(move |_| keep.borrow_mut().push("kept"));
    let drop_it = fired.clone();
    let cancelled = sim.schedule_destroy(move |_| drop_it.borrow_mut().push("cancelled"));
    assert!(!sim.is_expired(cancelled));
    assert_eq!(sim.delay_left(cancelled), Time::ZERO);

    sim.cancel(cancelled);
    assert!(sim.is_expired(cancelled));
    sim.destroy();
    assert_eq!(*fired.borrow(), vec!["kept"]);
}

#[test]
fn test_scheduling_from_destroy_event_is_discarded() {
    let mut sim = Simulator::new();
    let fired = log();
    let outer = fired.clone();
    sim.schedule_destroy(move |sim| {
        let inner = outer.clone();
        sim.schedule(Time::ZERO, move |_| inner.borrow_mut().push("late"));
        outer.borrow_mut().push("destroy");
    });
    sim.destroy();
    assert_eq!(*fired.borrow(), vec!["destroy"]);
}

#[test]
fn test_destroy_event_runs_under_registration_context() {
    let mut sim = Simulator::new();
    let seen = log();
    let outer = seen.clone();
    sim.schedule_with_context(Context::new(3), ns(1), move |sim| {
        let inner = outer.clone();
        sim.schedule_destroy(move |sim| inner.borrow_mut().push(sim.context()));
    });
    sim.run();
    sim.destroy();
    assert_eq!(*seen.borrow(), vec![Context::new(3)]);
}

#[test]
fn test_drop_runs_destroy_events() {
    let fired = log();
    {
        let mut sim = Simulator::new();
        let on_destroy = fired.clone();
        sim.schedule_destroy(move |_| on_destroy.borrow_mut().push("destroyed"));
        let never = fired.clone();
        sim.schedule(ns(1), move |_| never.borrow_mut().push("never"));
    }
    assert_eq!(*fired.borrow(), vec!["destroyed"]);
}

#[test]
fn test_struct_handler() {
    struct Counter(Rc<RefCell<u32>>);

    impl crate::EventHandler for Counter {
        fn invoke(self: Box<Self>, sim: &mut Simulator) {
            *self.0.borrow_mut() += 1;
            if *self.0.borrow() < 3 {
                sim.schedule_handler(ns(1), Counter(self.0.clone()));
            }
        }
    }

    let mut sim = Simulator::new();
    let count = Rc::new(RefCell::new(0));
    sim.schedule_handler(ns(1), Counter(count.clone()));
    sim.run();
    assert_eq!(*count.borrow(), 3);
    assert_eq!(sim.now(), ns(3));
}

#[test]
fn test_summary_and_lifecycle() {
    let mut sim = Simulator::new();
    assert_eq!(sim.state(), SimState::Ready);
    assert!(sim.is_finished());
    assert_eq!(sim.maximum_simulation_time(), Time::MAX);

    sim.schedule(ns(7), |sim| assert_eq!(sim.state(), SimState::Running));
    assert!(!sim.is_finished());
    sim.run();

    let summary = sim.summary();
    assert_eq!(summary.state, SimState::Stopped);
    assert_eq!(summary.now, ns(7));
    assert_eq!(summary.events_processed, 1);
    assert_eq!(summary.pending, 0);
}

#[test]
fn test_queue_kinds_agree_on_cancel_heavy_workload() {
    let mut orders = Vec::new();
    for kind in QueueKind::ALL {
        let mut sim = Simulator::with_config(SimConfig::default().with_queue(kind));
        let fired = log();
        let mut ids = Vec::new();
        for i in 0..40_i64 {
            let fired = fired.clone();
            ids.push(sim.schedule(ns((i * 7) % 13), move |_| fired.borrow_mut().push(i)));
        }
        for id in ids.iter().step_by(3) {
            sim.cancel(*id);
        }
        for id in ids.iter().skip(1).step_by(5) {
            sim.remove(*id);
        }
        sim.run();
        orders.push(fired.borrow().clone());
    }
    assert_eq!(orders[0], orders[1]);
    assert_eq!(orders[1], orders[2]);
    assert!(!orders[0].is_empty());
}

#[test]
fn test_destroy_from_callback_is_terminal() {
    let mut sim = Simulator::new();
    let fired = log();
    sim.schedule(ns(1), |sim| sim.destroy());
    record(&mut sim, &fired, "same time", ns(1));
    record(&mut sim, &fired, "later", ns(2));

    sim.run();
    assert_eq!(sim.state(), SimState::Destroyed);
    assert!(fired.borrow().is_empty());
    assert_eq!(sim.pending_count(), 0);
    assert_eq!(
        sim.try_schedule(ns(1), |_| {}),
        Err(crate::SimError::Destroyed)
    );
}

#[test]
fn test_destroy_from_callback_stops_run_until_and_step() {
    let mut sim = Simulator::new();
    sim.schedule(ns(5), |sim| sim.destroy());
    sim.schedule(ns(6), |_| panic!("ran after destroy"));
    sim.run_until(ns(100));
    assert_eq!(sim.state(), SimState::Destroyed);
    assert_eq!(sim.now(), ns(5));

    let mut sim = Simulator::new();
    sim.schedule(ns(1), |sim| sim.destroy());
    assert!(sim.step());
    assert_eq!(sim.state(), SimState::Destroyed);
}

#[test]
#[should_panic(expected = "has been destroyed")]
fn test_run_after_destroy_from_callback_panics() {
    let mut sim = Simulator::new();
    sim.schedule(ns(1), |sim| sim.destroy());
    sim.run();
    sim.run();
}

#[test]
#[should_panic(expected = "cannot step from inside an event callback")]
fn test_step_inside_callback_panics() {
    let mut sim = Simulator::new();
    sim.schedule(ns(1), |sim| {
        sim.schedule_now(|_| {});
        sim.step();
    });
    sim.run();
}

#[test]
#[should_panic(expected = "cannot run from inside an event callback")]
fn test_run_inside_callback_panics() {
    let mut sim = Simulator::new();
    sim.schedule(ns(1), |sim| sim.run());
    sim.run();
}

#[test]
#[should_panic(expected = "cannot run_until from inside an event callback")]
fn test_run_until_inside_callback_panics() {
    let mut sim = Simulator::new();
    sim.schedule(ns(1), |sim| sim.run_until(ns(10)));
    sim.run();
}

#[test]
#[should_panic(expected = "cannot run from inside an event callback")]
fn test_run_inside_destroy_callback_panics() {
    let mut sim = Simulator::new();
    sim.schedule_destroy(|sim| {
        sim.schedule_now(|_| {});
        sim.run();
    });
    sim.destroy();
}

#[test]
fn test_stop_still_honoured_after_nested_work() {
    // A callback that schedules more work must not disturb a later stop().
    let mut sim = Simulator::new();
    let fired = log();
    let a = fired.clone();
    sim.schedule(ns(1), move |sim| {
        a.borrow_mut().push(("A", sim.now()));
        record(sim, &a, "B", Time::ZERO);
    });
    let c = fired.clone();
    sim.schedule(ns(2), move |sim| {
        c.borrow_mut().push(("C", sim.now()));
        sim.stop();
    });
    record(&mut sim, &fired, "D", ns(3));

    sim.run();
    assert_eq!(
        *fired.borrow(),
        vec![("A", ns(1)), ("B", ns(1)), ("C", ns(2))]
    );
    assert_eq!(sim.pending_count(), 1);
}

#[test]
fn test_destroy_event_registered_during_destroy_is_discarded() {
    let mut sim = Simulator::new();
    let fired = log();
    let outer = fired.clone();
    sim.schedule_destroy(move |sim| {
        let inner = outer.clone();
        sim.schedule_destroy(move |_| inner.borrow_mut().push("late destroy"));
        outer.borrow_mut().push("destroy");
    });
    sim.destroy();
    assert_eq!(*fired.borrow(), vec!["destroy"]);
}

#[test]
fn test_destroy_event_cancelled_by_earlier_destroy_event() {
    let mut sim = Simulator::new();
    let fired = log();
    let first = fired.clone();
    let victim = sim.schedule_destroy(move |_| first.borrow_mut().push("first"));
    let second = fired.clone();
    // Runs first (newest-first) and cancels the older one.
    sim.schedule_destroy(move |sim| {
        second.borrow_mut().push("second");
        sim.cancel(victim);
    });
    sim.destroy();
    assert_eq!(*fired.borrow(), vec!["second"]);
}

#[test]
fn test_destroy_inside_destroy_callback_is_noop() {
    let mut sim = Simulator::new();
    let fired = log();
    let a = fired.clone();
    sim.schedule_destroy(move |_| a.borrow_mut().push("a"));
    let b = fired.clone();
    sim.schedule_destroy(move |sim| {
        sim.destroy();
        b.borrow_mut().push("b");
    });
    sim.destroy();
    assert_eq!(*fired.borrow(), vec!["b", "a"]);
    assert_eq!(sim.state(), SimState::Destroyed);
}
