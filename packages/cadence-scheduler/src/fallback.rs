use crate::clock::{Clock, Time};
use crate::error::SchedulerError;
use crate::host::Host;
use crate::state::LoopPhase;
use crate::stats::{Counters, bump};
use crate::task::{ScheduledCallback, run_slice};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Default)]
struct FallbackState {
    phase: LoopPhase,
    callback: Option<ScheduledCallback>,
    cancelled_while_running: bool,
    /// A flush timer is pending. At most one is kept in flight.
    flush_queued: bool,
}

/// Timer-only slice loop for hosts without a message channel.
///
/// It cannot measure the remaining budget, so every slice is told it has
/// time left and callbacks have to account for time themselves.
pub struct FallbackLoop {
    this: Weak<FallbackLoop>,
    host: Rc<dyn Host>,
    clock: Rc<dyn Clock>,
    state: RefCell<FallbackState>,
    counters: Rc<Counters>,
}

impl FallbackLoop {
    pub(crate) fn new(host: Rc<dyn Host>, clock: Rc<dyn Clock>, counters: Rc<Counters>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            host,
            clock,
            state: RefCell::new(FallbackState::default()),
            counters,
        })
    }

    /// Install `callback` and flush it on the next tick.
    ///
    /// If a callback is already pending or running, the request is retried
    /// on a later tick instead of overwriting it.
    pub fn request_callback(&self, callback: ScheduledCallback) {
        let mut state = self.state.borrow_mut();
        if state.callback.is_some() || state.phase == LoopPhase::SliceRunning {
            drop(state);
            bump(&self.counters.requests_deferred);
            tracing::debug!("callback already pending; deferring request to the next tick");
            let fallback = self.this.clone();
            self.host.set_timeout(
                Box::new(move || {
                    if let Some(fallback) = fallback.upgrade() {
                        fallback.request_callback(callback);
                    }
                    Ok(())
                }),
                0.0,
            );
            return;
        }

        state.callback = Some(callback);
        state.phase = LoopPhase::SliceScheduled;
        drop(state);
        self.schedule_flush();
    }

    /// Lazy like the message loop: a queued flush still arrives, finds the
    /// slot empty and moves the loop to `Idle`.
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

    /// Run the pending callback once, if there is one.
    ///
    /// A failing callback stays installed and another flush is queued before
    /// the error is returned.
    pub fn flush(&self) -> Result<(), SchedulerError> {
        let mut callback = {
            let mut state = self.state.borrow_mut();
            state.flush_queued = false;
            match state.callback.take() {
                Some(callback) => {
                    state.phase = LoopPhase::SliceRunning;
                    state.cancelled_while_running = false;
                    callback
                }
                None => {
                    state.phase = LoopPhase::Idle;
                    tracing::debug!("flush found no callback; fallback loop stopped");
                    return Ok(());
                }
            }
        };

        let current_time = self.clock.now();
        tracing::trace!(current_time, "fallback flush");
        let result = run_slice(&mut callback, true, current_time);
        bump(&self.counters.slices_run);

        let reschedule = {
            let mut state = self.state.borrow_mut();
            let restore = !state.cancelled_while_running && !matches!(result, Ok(false));
            if restore {
                state.callback = Some(callback);
            }
            let reschedule = restore || result.is_err();
            state.phase = if reschedule {
                LoopPhase::SliceScheduled
            } else {
                LoopPhase::Idle
            };
            reschedule
        };

        if reschedule {
            self.schedule_flush();
        }

        result.map(|_| ()).map_err(|err| {
            bump(&self.counters.slices_failed);
            SchedulerError::Work(err)
        })
    }

    pub fn now(&self) -> Time {
        self.clock.now()
    }

    pub fn phase(&self) -> LoopPhase {
        self.state.borrow().phase
    }

    fn schedule_flush(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.flush_queued {
                return;
            }
            state.flush_queued = true;
        }
        let fallback = self.this.clone();
        bump(&self.counters.continuations_posted);
        self.host.set_timeout(
            Box::new(move || match fallback.upgrade() {
                Some(fallback) => fallback.flush(),
                None => Ok(()),
            }),
            0.0,
        );
    }
}
