use crate::clock::{Clock, Time, WallClock};
use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::rc::Rc;

new_key_type! {
    /// Identifies one pending host timer.
    pub struct TimerId;
}

/// A unit of host work. Errors are surfaced to whatever runs the host queue.
pub type HostTask = Box<dyn FnOnce() -> Result<(), SchedulerError>>;

/// Primitives a host environment may or may not offer.
///
/// Probed once when an adapter is built; the answer is never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    /// A message-passing continuation that runs on a later host turn.
    pub message_channel: bool,
    /// A query telling whether user input is waiting to be handled.
    pub input_pending: bool,
    pub high_resolution_clock: bool,
    /// Frame callbacks. Only checked so a missing one can be reported.
    pub animation_frame: bool,
}

impl HostCapabilities {
    pub const fn interactive() -> Self {
        Self {
            message_channel: true,
            input_pending: true,
            high_resolution_clock: true,
            animation_frame: true,
        }
    }

    pub const fn timer_only() -> Self {
        Self {
            message_channel: false,
            input_pending: false,
            high_resolution_clock: false,
            animation_frame: false,
        }
    }
}

/// The environment that owns the shared thread.
///
/// Adapters never run work themselves; they hand continuations to the host
/// and are re-entered when the host delivers them.
pub trait Host {
    fn capabilities(&self) -> HostCapabilities;

    /// `None` when the host has no high-resolution time source.
    fn high_resolution_clock(&self) -> Option<Rc<dyn Clock>>;

    fn wall_clock(&self) -> Rc<dyn Clock> {
        Rc::new(WallClock::new())
    }

    /// Queue `task` behind everything already waiting on the host queue.
    ///
    /// Hosts without a message channel get a zero-delay timer instead.
    fn post_message(&self, task: HostTask) {
        self.set_timeout(task, 0.0);
    }

    fn set_timeout(&self, task: HostTask, delay_ms: Time) -> TimerId;

    /// Clearing an expired or unknown timer is a no-op.
    fn clear_timeout(&self, id: TimerId);

    fn is_input_pending(&self) -> bool {
        false
    }
}
