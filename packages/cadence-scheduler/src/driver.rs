use crate::clock::{Clock, Time};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::SchedulerError;
use crate::host::Host;
use crate::policy::{YieldInputs, YieldPolicy, yield_interval_for_frame_rate};
use crate::state::LoopPhase;
use crate::stats::{Counters, bump};
use crate::task::{ScheduledCallback, run_slice};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Default)]
struct LoopState {
    phase: LoopPhase,
    callback: Option<ScheduledCallback>,
    /// `cancel_callback` ran while the current slice was executing.
    cancelled_while_running: bool,
}

/// Runs the scheduled callback one slice per host message.
///
/// Each slice is a separate host task, so whatever the host queued in the
/// meantime (input, paint, other messages) runs between two slices.
pub struct MessageLoopDriver {
    this: Weak<MessageLoopDriver>,
    host: Rc<dyn Host>,
    clock: Rc<dyn Clock>,
    policy: YieldPolicy,
    state: RefCell<LoopState>,
    base_interval: Time,
    yield_interval: Cell<Time>,
    max_yield_interval: Time,
    deadline: Cell<Time>,
    needs_paint: Cell<bool>,
    counters: Rc<Counters>,
    diagnostics: DiagnosticSink,
}

pub(crate) struct DriverOptions {
    pub policy: YieldPolicy,
    pub yield_interval: Time,
    pub max_yield_interval: Time,
}

impl MessageLoopDriver {
    pub(crate) fn new(
        host: Rc<dyn Host>,
        clock: Rc<dyn Clock>,
        options: DriverOptions,
        counters: Rc<Counters>,
        diagnostics: DiagnosticSink,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            host,
            clock,
            policy: options.policy,
            state: RefCell::new(LoopState::default()),
            base_interval: options.yield_interval,
            yield_interval: Cell::new(options.yield_interval),
            max_yield_interval: options.max_yield_interval,
            deadline: Cell::new(0.0),
            needs_paint: Cell::new(false),
            counters,
            diagnostics,
        })
    }

    /// Called from inside a running slice, the new callback supersedes the
    /// running one even if that slice reports no more work.
    pub fn request_callback(&self, callback: ScheduledCallback) {
        let start_loop = {
            let mut state = self.state.borrow_mut();
            state.callback = Some(callback);
            match state.phase {
                LoopPhase::Idle => {
                    state.phase = LoopPhase::SliceScheduled;
                    true
                }
                // A continuation is already queued, or the running slice will
                // pick the new callback up when it returns.
                LoopPhase::SliceScheduled | LoopPhase::SliceRunning => false,
            }
        };
        if start_loop {
            tracing::debug!("starting message loop");
            self.post_continuation();
        }
    }

    /// Drop the stored callback. A queued continuation is left alone and
    /// exits quietly when it finds the slot empty.
    pub fn cancel_callback(&self) {
        let dropped = {
            let mut state = self.state.borrow_mut();
            if state.phase == LoopPhase::SliceRunning {
                state.cancelled_while_running = true;
            }
            state.callback.take()
        };
        drop(dropped);
    }

    pub fn should_yield(&self) -> bool {
        let inputs = YieldInputs {
            now: self.clock.now(),
            deadline: self.deadline.get(),
            needs_paint: self.needs_paint.get(),
            max_yield_interval: self.max_yield_interval,
        };
        let yield_now = self
            .policy
            .should_yield(inputs, || self.host.is_input_pending());
        if yield_now {
            bump(&self.counters.yields_signalled);
        }
        yield_now
    }

    pub fn request_paint(&self) {
        if self.policy.tracks_paint() {
            self.needs_paint.set(true);
        }
    }

    pub fn set_frame_rate(&self, fps: f64) {
        match yield_interval_for_frame_rate(fps, self.base_interval) {
            Ok(interval) => {
                tracing::debug!(fps, interval, "yield interval updated");
                self.yield_interval.set(interval);
            }
            Err(err) => {
                tracing::debug!(%err, "frame rate rejected");
                (self.diagnostics)(&Diagnostic::FrameRateOutOfRange { fps });
            }
        }
    }

    pub fn now(&self) -> Time {
        self.clock.now()
    }

    pub fn phase(&self) -> LoopPhase {
        self.state.borrow().phase
    }

    pub fn yield_interval(&self) -> Time {
        self.yield_interval.get()
    }

    pub fn policy(&self) -> YieldPolicy {
        self.policy
    }

    /// Continuation handler. Runs at most one slice.
    ///
    /// On a failed slice the next continuation is already posted when the
    /// error is returned to the host.
    pub fn perform_work_until_deadline(&self) -> Result<(), SchedulerError> {
        let outcome = self.run_scheduled_slice();
        // Control goes back to the host next, which gives it a chance to paint.
        self.needs_paint.set(false);
        outcome
    }

    fn run_scheduled_slice(&self) -> Result<(), SchedulerError> {
        let mut callback = {
            let mut state = self.state.borrow_mut();
            match state.callback.take() {
                Some(callback) => {
                    state.phase = LoopPhase::SliceRunning;
                    state.cancelled_while_running = false;
                    callback
                }
                None => {
                    state.phase = LoopPhase::Idle;
                    tracing::debug!("continuation found no callback; message loop stopped");
                    return Ok(());
                }
            }
        };

        let current_time = self.clock.now();
        self.deadline.set(current_time + self.yield_interval.get());
        tracing::trace!(current_time, deadline = self.deadline.get(), "slice start");

        let result = run_slice(&mut callback, true, current_time);
        bump(&self.counters.slices_run);

        let keep_running = {
            let mut state = self.state.borrow_mut();
            let has_more_work = !matches!(result, Ok(false));
            if state.callback.is_some() {
                // request_callback ran during the slice; the new callback wins.
                state.phase = LoopPhase::SliceScheduled;
                true
            } else if has_more_work {
                if !state.cancelled_while_running {
                    state.callback = Some(callback);
                }
                state.phase = LoopPhase::SliceScheduled;
                true
            } else {
                state.phase = LoopPhase::Idle;
                false
            }
        };

        if keep_running {
            self.post_continuation();
        } else {
            tracing::debug!("no more work; message loop stopped");
        }

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                bump(&self.counters.slices_failed);
                tracing::debug!(%err, "slice failed; next continuation already posted");
                Err(SchedulerError::Work(err))
            }
        }
    }

    fn post_continuation(&self) {
        let driver = self.this.clone();
        bump(&self.counters.continuations_posted);
        self.host.post_message(Box::new(move || match driver.upgrade() {
            Some(driver) => driver.perform_work_until_deadline(),
            None => Ok(()),
        }));
    }
}
