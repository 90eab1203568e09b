use cadence_scheduler::{
    Capability, Diagnostic, EventLoop, HostAdapter, HostCapabilities, RecordingSink,
    SchedulerBuilder, YieldPolicy,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

fn interactive_with(
    capabilities: HostCapabilities,
) -> (Rc<EventLoop>, Rc<dyn HostAdapter>, RecordingSink) {
    let host = Rc::new(EventLoop::virtual_time(capabilities));
    let diagnostics = RecordingSink::new();
    let scheduler = SchedulerBuilder::new(host.clone())
        .diagnostics(diagnostics.sink())
        .build()
        .unwrap();
    (host, scheduler, diagnostics)
}

fn interactive() -> (Rc<EventLoop>, Rc<dyn HostAdapter>, RecordingSink) {
    interactive_with(HostCapabilities::interactive())
}

/// Runs `probe` inside a single slice and returns what it recorded.
fn in_slice<T: 'static>(
    host: &Rc<EventLoop>,
    scheduler: &Rc<dyn HostAdapter>,
    probe: impl Fn(&EventLoop, &dyn HostAdapter) -> T + 'static,
) -> T {
    let out = Rc::new(RefCell::new(None));
    {
        let out = out.clone();
        let host = host.clone();
        let weak: Weak<dyn HostAdapter> = Rc::downgrade(scheduler);
        scheduler.request_callback(Box::new(move |_, _| {
            let scheduler = weak.upgrade().unwrap();
            *out.borrow_mut() = Some(probe(&*host, &*scheduler));
            Ok(false)
        }));
    }
    host.run_until_idle();
    let value = out.borrow_mut().take();
    value.expect("slice did not run")
}

#[test]
fn test_no_yield_before_deadline_regardless_of_signals() {
    let (host, scheduler, _) = interactive();

    let answers = in_slice(&host, &scheduler, |host, scheduler| {
        scheduler.request_paint();
        host.set_input_pending(true);
        let at_start = scheduler.should_yield();
        host.advance(4.9);
        let just_before = scheduler.should_yield();
        host.advance(0.1);
        let at_deadline = scheduler.should_yield();
        (at_start, just_before, at_deadline)
    });

    assert_eq!(answers, (false, false, true));
}

#[test]
fn test_past_deadline_yields_only_for_host_work() {
    let (host, scheduler, _) = interactive();

    let answers = in_slice(&host, &scheduler, |host, scheduler| {
        host.advance(6.0);
        let idle_host = scheduler.should_yield();
        host.set_input_pending(true);
        let input_waiting = scheduler.should_yield();
        host.set_input_pending(false);
        scheduler.request_paint();
        let paint_waiting = scheduler.should_yield();
        (idle_host, input_waiting, paint_waiting)
    });

    assert_eq!(answers, (false, true, true));
    assert_eq!(scheduler.stats().yields_signalled, 2);
}

#[test]
fn test_max_yield_interval_forces_yield() {
    let (host, scheduler, _) = interactive();
    host.advance(298.0);

    let answers = in_slice(&host, &scheduler, |host, scheduler| {
        host.advance(1.0);
        let before_deadline = scheduler.should_yield();
        host.advance(4.0);
        // past the deadline at 303, nothing waiting, but now >= 300
        let past_ceiling = scheduler.should_yield();
        (before_deadline, past_ceiling)
    });

    assert_eq!(answers, (false, true));
}

#[test]
fn test_needs_paint_cleared_after_every_slice() {
    let (host, scheduler, _) = interactive();
    let answers = Rc::new(RefCell::new(Vec::new()));

    {
        let answers = answers.clone();
        let host = host.clone();
        let weak = Rc::downgrade(&scheduler);
        let slices = Cell::new(0);
        scheduler.request_callback(Box::new(move |_, _| {
            let scheduler = weak.upgrade().unwrap();
            slices.set(slices.get() + 1);
            if slices.get() == 1 {
                scheduler.request_paint();
            }
            host.advance(6.0);
            answers.borrow_mut().push(scheduler.should_yield());
            Ok(slices.get() < 2)
        }));
    }

    host.run_until_idle();

    assert_eq!(*answers.borrow(), vec![true, false]);
}

#[test]
fn test_deadline_policy_without_input_query() {
    let (host, scheduler, diagnostics) = interactive_with(HostCapabilities {
        input_pending: false,
        ..HostCapabilities::interactive()
    });

    assert_eq!(scheduler.stats().policy, YieldPolicy::Deadline);
    assert!(diagnostics.contains(&Diagnostic::MissingCapability {
        capability: Capability::InputPending
    }));

    let answers = in_slice(&host, &scheduler, |host, scheduler| {
        host.advance(4.0);
        let before = scheduler.should_yield();
        host.advance(1.0);
        (before, scheduler.should_yield())
    });

    assert_eq!(answers, (false, true));
}

#[test]
fn test_set_frame_rate_updates_interval() {
    let (_host, scheduler, diagnostics) = interactive();

    scheduler.set_frame_rate(60.0);
    assert_eq!(scheduler.stats().yield_interval_ms, 16.0);

    scheduler.set_frame_rate(125.0);
    assert_eq!(scheduler.stats().yield_interval_ms, 8.0);

    scheduler.set_frame_rate(0.0);
    assert_eq!(scheduler.stats().yield_interval_ms, 5.0);

    assert!(diagnostics.is_empty());
}

#[test]
fn test_set_frame_rate_rejects_out_of_range() {
    let (_host, scheduler, diagnostics) = interactive();
    scheduler.set_frame_rate(30.0);
    assert_eq!(scheduler.stats().yield_interval_ms, 33.0);

    scheduler.set_frame_rate(-1.0);
    assert_eq!(scheduler.stats().yield_interval_ms, 33.0);

    scheduler.set_frame_rate(200.0);
    assert_eq!(scheduler.stats().yield_interval_ms, 33.0);

    assert_eq!(
        diagnostics.take(),
        vec![
            Diagnostic::FrameRateOutOfRange { fps: -1.0 },
            Diagnostic::FrameRateOutOfRange { fps: 200.0 },
        ]
    );
}

#[test]
fn test_frame_rate_moves_the_deadline() {
    let (host, scheduler, _) = interactive();
    scheduler.set_frame_rate(60.0);

    let answers = in_slice(&host, &scheduler, |host, scheduler| {
        scheduler.request_paint();
        host.advance(10.0);
        let inside_frame = scheduler.should_yield();
        host.advance(6.0);
        (inside_frame, scheduler.should_yield())
    });

    assert_eq!(answers, (false, true));
}

#[test]
fn test_short_slices_never_yield_mid_slice() {
    let (host, scheduler, _) = interactive();
    let counter = Rc::new(Cell::new(0));
    let yielded = Rc::new(Cell::new(false));

    {
        let counter = counter.clone();
        let yielded = yielded.clone();
        let host = host.clone();
        let weak = Rc::downgrade(&scheduler);
        scheduler.request_callback(Box::new(move |has_time_remaining, _| {
            assert!(has_time_remaining);
            let scheduler = weak.upgrade().unwrap();
            counter.set(counter.get() + 1);
            host.advance(2.0);
            if scheduler.should_yield() {
                yielded.set(true);
            }
            Ok(counter.get() < 3)
        }));
    }

    host.run_until_idle();

    assert_eq!(counter.get(), 3);
    assert!(!yielded.get());
    assert!(!scheduler.is_loop_running());
    assert_eq!(scheduler.stats().slices_run, 3);
    assert_eq!(scheduler.stats().yields_signalled, 0);
}

#[test]
fn test_deadline_is_reset_at_each_slice_start() {
    let (host, scheduler, _) = interactive();
    let at_start = Rc::new(RefCell::new(Vec::new()));

    {
        let at_start = at_start.clone();
        let host = host.clone();
        let weak = Rc::downgrade(&scheduler);
        let slices = Cell::new(0);
        scheduler.request_callback(Box::new(move |_, now| {
            let scheduler = weak.upgrade().unwrap();
            assert_eq!(now, host.now());
            scheduler.request_paint();
            at_start.borrow_mut().push(scheduler.should_yield());
            // overrun the budget by a wide margin
            host.advance(50.0);
            slices.set(slices.get() + 1);
            Ok(slices.get() < 3)
        }));
    }

    host.run_until_idle();

    assert_eq!(*at_start.borrow(), vec![false, false, false]);
}
