//! Cooperative time-sliced scheduling on a thread shared with a host.
//!
//! The scheduler never preempts. It runs one slice of a single scheduled
//! callback per host turn, and the callback polls
//! [`HostAdapter::should_yield`] to hand the thread back early.

pub mod adapter;
pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod event_loop;
pub mod fallback;
pub mod host;
pub mod policy;
pub mod state;
pub mod stats;
pub mod task;
pub mod timeout;

pub use adapter::{AdapterMode, FallbackAdapter, HostAdapter, InteractiveAdapter, SchedulerBuilder};
pub use clock::{Clock, ManualClock, MonotonicClock, Time, WallClock};
pub use config::{DEFAULT_YIELD_INTERVAL_MS, MAX_FRAME_RATE, MAX_YIELD_INTERVAL_MS, SchedulerConfig};
pub use diagnostics::{Capability, Diagnostic, DiagnosticSink, RecordingSink};
pub use error::{SchedulerError, WorkError};
pub use event_loop::EventLoop;
pub use host::{Host, HostCapabilities, HostTask, TimerId};
pub use policy::YieldPolicy;
pub use state::LoopPhase;
pub use stats::SchedulerStats;
pub use task::{ScheduledCallback, TimeoutCallback};
pub use timeout::TimeoutHandle;
