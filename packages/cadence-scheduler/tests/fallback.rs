use cadence_scheduler::{
    AdapterMode, Capability, Diagnostic, EventLoop, HostAdapter, HostCapabilities, LoopPhase,
    RecordingSink, SchedulerBuilder, SchedulerConfig, SchedulerError, WorkError, YieldPolicy,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn timer_only() -> (Rc<EventLoop>, Rc<dyn HostAdapter>, RecordingSink) {
    let host = Rc::new(EventLoop::virtual_time(HostCapabilities::timer_only()));
    let diagnostics = RecordingSink::new();
    let scheduler = SchedulerBuilder::new(host.clone())
        .diagnostics(diagnostics.sink())
        .build()
        .unwrap();
    (host, scheduler, diagnostics)
}

#[test]
fn test_timer_only_host_selects_fallback() {
    let (_host, scheduler, diagnostics) = timer_only();

    assert_eq!(scheduler.mode(), AdapterMode::Fallback);
    assert_eq!(scheduler.stats().policy, YieldPolicy::Never);
    assert!(diagnostics.contains(&Diagnostic::MissingCapability {
        capability: Capability::MessageChannel
    }));
    assert!(diagnostics.contains(&Diagnostic::MissingCapability {
        capability: Capability::HighResolutionClock
    }));
}

#[test]
fn test_fallback_never_yields_and_ignores_paint_and_frame_rate() {
    let (host, scheduler, diagnostics) = timer_only();
    diagnostics.take();

    scheduler.request_paint();
    host.advance(1_000.0);
    assert!(!scheduler.should_yield());

    scheduler.set_frame_rate(200.0);
    scheduler.set_frame_rate(60.0);
    assert!(diagnostics.is_empty());
    assert_eq!(scheduler.stats().yield_interval_ms, 5.0);
}

#[test]
fn test_fallback_always_reports_time_remaining() {
    let (host, scheduler, _) = timer_only();
    let seen = Rc::new(RefCell::new(Vec::new()));

    {
        let seen = seen.clone();
        let host = host.clone();
        scheduler.request_callback(Box::new(move |has_time_remaining, _| {
            seen.borrow_mut().push(has_time_remaining);
            // far past any budget
            host.advance(500.0);
            Ok(seen.borrow().len() < 3)
        }));
    }

    host.run_until_idle();

    assert_eq!(*seen.borrow(), vec![true, true, true]);
    assert_eq!(scheduler.phase(), LoopPhase::Idle);
    assert!(!scheduler.is_loop_running());
}

#[test]
fn test_failed_flush_is_retried_next_tick() {
    let (host, scheduler, _) = timer_only();
    let slices = Rc::new(Cell::new(0));

    {
        let slices = slices.clone();
        scheduler.request_callback(Box::new(move |_, _| {
            slices.set(slices.get() + 1);
            if slices.get() == 1 {
                return Err(WorkError::msg("flush failed"));
            }
            Ok(false)
        }));
    }

    let err = host.turn().unwrap_err();
    assert!(matches!(err, SchedulerError::Work(_)));
    assert_eq!(host.pending_timers(), 1);

    host.run_until_idle();
    assert_eq!(slices.get(), 2);
    assert!(host.take_unhandled_errors().is_empty());
    assert_eq!(scheduler.stats().slices_failed, 1);
}

#[test]
fn test_request_while_pending_is_deferred_not_dropped() {
    let (host, scheduler, _) = timer_only();
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["first", "second"] {
        let log = log.clone();
        scheduler.request_callback(Box::new(move |_, _| {
            log.borrow_mut().push(name);
            Ok(false)
        }));
    }

    host.run_until_idle();

    assert_eq!(*log.borrow(), vec!["first", "second"]);
    assert_eq!(scheduler.stats().requests_deferred, 1);
}

#[test]
fn test_reentrant_request_runs_after_current_callback() {
    let (host, scheduler, _) = timer_only();
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let log = log.clone();
        let weak = Rc::downgrade(&scheduler);
        scheduler.request_callback(Box::new(move |_, _| {
            log.borrow_mut().push("outer start");
            let log = log.clone();
            weak.upgrade().unwrap().request_callback(Box::new(move |_, _| {
                log.borrow_mut().push("inner");
                Ok(false)
            }));
            Ok(false)
        }));
    }

    host.run_until_idle();

    assert_eq!(*log.borrow(), vec!["outer start", "inner"]);
    assert_eq!(scheduler.stats().requests_deferred, 1);
}

#[test]
fn test_cancelled_fallback_callback_never_runs() {
    let (host, scheduler, _) = timer_only();
    let ran = Rc::new(Cell::new(false));

    {
        let ran = ran.clone();
        scheduler.request_callback(Box::new(move |_, _| {
            ran.set(true);
            Ok(false)
        }));
    }
    scheduler.cancel_callback();
    // The flush timer is still queued until it runs and finds nothing
    assert_eq!(host.pending_timers(), 1);
    assert_eq!(scheduler.phase(), LoopPhase::SliceScheduled);
    assert!(scheduler.is_loop_running());

    host.run_until_idle();
    assert!(!ran.get());
    assert_eq!(scheduler.phase(), LoopPhase::Idle);
    assert!(!scheduler.is_loop_running());
}

#[test]
fn test_loop_stays_running_while_a_flush_is_queued() {
    let (host, scheduler, _) = timer_only();
    let weak = Rc::downgrade(&scheduler);

    // Cancelled mid-slice and failing: no callback left, but the retry
    // flush is still on its way.
    scheduler.request_callback(Box::new(move |_, _| {
        weak.upgrade().unwrap().cancel_callback();
        Err(WorkError::msg("gave up"))
    }));

    assert!(host.turn().is_err());
    assert_eq!(host.pending_timers(), 1);
    assert_eq!(scheduler.phase(), LoopPhase::SliceScheduled);

    assert!(host.turn().unwrap());
    assert_eq!(host.pending_timers(), 0);
    assert_eq!(scheduler.phase(), LoopPhase::Idle);
    assert_eq!(scheduler.stats().slices_run, 1);
}

#[test]
fn test_replacement_after_cancel_runs_once_per_tick() {
    let (host, scheduler, _) = timer_only();
    let slices = Rc::new(Cell::new(0));

    scheduler.request_callback(Box::new(|_, _| Ok(false)));
    scheduler.cancel_callback();
    {
        let slices = slices.clone();
        scheduler.request_callback(Box::new(move |_, _| {
            slices.set(slices.get() + 1);
            Ok(slices.get() < 2)
        }));
    }

    // A single flush timer carries the replacement
    assert_eq!(host.pending_timers(), 1);
    assert!(host.turn().unwrap());
    assert_eq!(slices.get(), 1);

    host.run_until_idle();
    assert_eq!(slices.get(), 2);
}

#[test]
fn test_force_fallback_on_capable_host() {
    let host = Rc::new(EventLoop::virtual_time(HostCapabilities::interactive()));
    let diagnostics = RecordingSink::new();
    let scheduler = SchedulerBuilder::new(host.clone())
        .config(SchedulerConfig {
            force_fallback: true,
            ..SchedulerConfig::default()
        })
        .diagnostics(diagnostics.sink())
        .build()
        .unwrap();

    assert_eq!(scheduler.mode(), AdapterMode::Fallback);
    assert!(diagnostics.is_empty());

    let ran = Rc::new(Cell::new(false));
    {
        let ran = ran.clone();
        scheduler.request_callback(Box::new(move |_, _| {
            ran.set(true);
            Ok(false)
        }));
    }
    // Timer-driven: nothing on the message queue
    assert_eq!(host.pending_messages(), 0);
    host.run_until_idle();
    assert!(ran.get());
}
