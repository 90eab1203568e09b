use crate::clock::Time;
use crate::error::WorkError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// The single pending unit of work.
///
/// Called with `(has_time_remaining, current_time)`; returns whether more
/// work is left. Long work should poll `should_yield()` and return early.
pub type ScheduledCallback = Box<dyn FnMut(bool, Time) -> Result<bool, WorkError>>;

/// Delayed continuation; receives the time it fired at.
pub type TimeoutCallback = Box<dyn FnOnce(Time)>;

/// Invoke one slice. A panic inside the work unit becomes a `WorkError`.
pub(crate) fn run_slice(
    callback: &mut ScheduledCallback,
    has_time_remaining: bool,
    current_time: Time,
) -> Result<bool, WorkError> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(has_time_remaining, current_time))) {
        Ok(result) => result,
        Err(payload) => Err(WorkError::Panicked(panic_message(payload))),
    }
}

pub(crate) fn run_timeout(callback: TimeoutCallback, current_time: Time) -> Result<(), WorkError> {
    panic::catch_unwind(AssertUnwindSafe(|| callback(current_time)))
        .map_err(|payload| WorkError::Panicked(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
