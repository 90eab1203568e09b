use crate::clock::{Clock, Time};
use crate::error::SchedulerError;
use crate::host::{Host, TimerId};
use crate::stats::{Counters, bump};
use crate::task::{TimeoutCallback, run_timeout};
use std::cell::Cell;
use std::rc::Rc;

/// Opaque reference to a pending delayed continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutHandle(TimerId);

/// Tracks at most one delayed continuation, independent of the slice loop.
///
/// Multiplexing several timeouts belongs to whatever sits above this.
pub struct TimeoutAdapter {
    host: Rc<dyn Host>,
    clock: Rc<dyn Clock>,
    tracked: Cell<Option<TimerId>>,
    counters: Rc<Counters>,
}

impl TimeoutAdapter {
    pub(crate) fn new(host: Rc<dyn Host>, clock: Rc<dyn Clock>, counters: Rc<Counters>) -> Self {
        Self {
            host,
            clock,
            tracked: Cell::new(None),
            counters,
        }
    }

    /// Schedule `callback` after `delay_ms`.
    ///
    /// Replaces the tracked handle. A previously requested timer is not
    /// cancelled; it still fires but can no longer be cancelled from here.
    pub fn request(&self, callback: TimeoutCallback, delay_ms: Time) -> TimeoutHandle {
        let clock = self.clock.clone();
        let counters = self.counters.clone();
        let id = self.host.set_timeout(
            Box::new(move || {
                bump(&counters.timeouts_fired);
                run_timeout(callback, clock.now()).map_err(SchedulerError::Timeout)
            }),
            delay_ms.max(0.0),
        );
        bump(&self.counters.timeouts_requested);

        if let Some(previous) = self.tracked.replace(Some(id)) {
            tracing::trace!(?previous, "replacing tracked timeout");
        }
        tracing::trace!(?id, delay_ms, "timeout requested");
        TimeoutHandle(id)
    }

    /// Cancel the tracked timer. Returns whether one was tracked.
    pub fn cancel(&self) -> bool {
        match self.tracked.take() {
            Some(id) => {
                self.host.clear_timeout(id);
                bump(&self.counters.timeouts_cancelled);
                tracing::trace!(?id, "timeout cancelled");
                true
            }
            None => false,
        }
    }
}
