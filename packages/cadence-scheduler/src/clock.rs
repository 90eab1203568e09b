use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the clock's origin.
pub type Time = f64;

/// A monotonic millisecond time source.
pub trait Clock {
    fn now(&self) -> Time;

    /// Block the thread until `deadline`. Virtual clocks jump instead.
    ///
    /// Returns `false` without waiting when `deadline` is too far away to
    /// sleep for.
    fn wait_until(&self, deadline: Time) -> bool {
        let remaining = deadline - self.now();
        if remaining <= 0.0 {
            return true;
        }
        match Duration::try_from_secs_f64(remaining / 1000.0) {
            Ok(duration) => {
                std::thread::sleep(duration);
                true
            }
            Err(_) => false,
        }
    }
}

/// High-resolution clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Wall-clock delta from creation.
///
/// Used when no high-resolution source exists. Adjusting the system clock
/// moves this clock too, so it is not strictly monotonic.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin_ms: f64,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin_ms: system_millis(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Time {
        system_millis() - self.origin_ms
    }
}

fn system_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Simulated clock that only moves when told to.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Time>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(time: Time) -> Self {
        Self {
            now: Rc::new(Cell::new(time)),
        }
    }

    pub fn advance(&self, ms: Time) {
        if ms > 0.0 {
            self.now.set(self.now.get() + ms);
        }
    }

    pub fn set(&self, time: Time) {
        self.now.set(time);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        self.now.get()
    }

    fn wait_until(&self, deadline: Time) -> bool {
        if !deadline.is_finite() {
            return false;
        }
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
        true
    }
}
