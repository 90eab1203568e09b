use crate::clock::{Clock, Time};
use crate::config::SchedulerConfig;
use crate::diagnostics::{Capability, Diagnostic, DiagnosticSink, tracing_sink};
use crate::driver::{DriverOptions, MessageLoopDriver};
use crate::error::SchedulerError;
use crate::fallback::FallbackLoop;
use crate::host::{Host, HostCapabilities};
use crate::policy::YieldPolicy;
use crate::state::LoopPhase;
use crate::stats::{Counters, SchedulerStats};
use crate::task::{ScheduledCallback, TimeoutCallback};
use crate::timeout::{TimeoutAdapter, TimeoutHandle};
use serde::Serialize;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterMode {
    /// Message-channel continuations, yield decisions backed by the host.
    Interactive,
    /// Zero-delay timers only; never asks to yield mid-slice.
    Fallback,
}

/// The scheduling surface a runtime talks to.
///
/// Exactly one implementation is chosen per host when the scheduler is
/// built, and it stays fixed for the adapter's lifetime.
pub trait HostAdapter {
    fn mode(&self) -> AdapterMode;

    /// Monotonic milliseconds.
    fn now(&self) -> Time;

    /// Make `callback` the single scheduled unit of work, replacing any
    /// previous one, and start the slice loop if it is not running.
    fn request_callback(&self, callback: ScheduledCallback);

    /// Lazy: a queued continuation still arrives but runs nothing.
    fn cancel_callback(&self);

    fn request_timeout(&self, callback: TimeoutCallback, delay_ms: Time) -> TimeoutHandle;

    /// No-op if no timeout is tracked.
    fn cancel_timeout(&self);

    /// Polled by running work to decide whether to return early.
    fn should_yield(&self) -> bool;

    fn request_paint(&self);

    /// Invalid rates are reported to the diagnostic sink, never returned.
    fn set_frame_rate(&self, fps: f64);

    fn phase(&self) -> LoopPhase;

    fn is_loop_running(&self) -> bool {
        self.phase().is_running()
    }

    fn stats(&self) -> SchedulerStats;
}

pub struct InteractiveAdapter {
    driver: Rc<MessageLoopDriver>,
    timeouts: TimeoutAdapter,
    counters: Rc<Counters>,
}

impl HostAdapter for InteractiveAdapter {
    fn mode(&self) -> AdapterMode {
        AdapterMode::Interactive
    }

    fn now(&self) -> Time {
        self.driver.now()
    }

    fn request_callback(&self, callback: ScheduledCallback) {
        self.driver.request_callback(callback);
    }

    fn cancel_callback(&self) {
        self.driver.cancel_callback();
    }

    fn request_timeout(&self, callback: TimeoutCallback, delay_ms: Time) -> TimeoutHandle {
        self.timeouts.request(callback, delay_ms)
    }

    fn cancel_timeout(&self) {
        self.timeouts.cancel();
    }

    fn should_yield(&self) -> bool {
        self.driver.should_yield()
    }

    fn request_paint(&self) {
        self.driver.request_paint();
    }

    fn set_frame_rate(&self, fps: f64) {
        self.driver.set_frame_rate(fps);
    }

    fn phase(&self) -> LoopPhase {
        self.driver.phase()
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats::collect(
            AdapterMode::Interactive,
            self.driver.policy(),
            self.driver.phase(),
            self.driver.yield_interval(),
            &self.counters,
        )
    }
}

pub struct FallbackAdapter {
    slices: Rc<FallbackLoop>,
    timeouts: TimeoutAdapter,
    yield_interval: Time,
    counters: Rc<Counters>,
}

impl HostAdapter for FallbackAdapter {
    fn mode(&self) -> AdapterMode {
        AdapterMode::Fallback
    }

    fn now(&self) -> Time {
        self.slices.now()
    }

    fn request_callback(&self, callback: ScheduledCallback) {
        self.slices.request_callback(callback);
    }

    fn cancel_callback(&self) {
        self.slices.cancel_callback();
    }

    fn request_timeout(&self, callback: TimeoutCallback, delay_ms: Time) -> TimeoutHandle {
        self.timeouts.request(callback, delay_ms)
    }

    fn cancel_timeout(&self) {
        self.timeouts.cancel();
    }

    fn should_yield(&self) -> bool {
        false
    }

    fn request_paint(&self) {}

    fn set_frame_rate(&self, fps: f64) {
        tracing::debug!(fps, "timer-only adapter ignores frame rate");
    }

    fn phase(&self) -> LoopPhase {
        self.slices.phase()
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats::collect(
            AdapterMode::Fallback,
            YieldPolicy::Never,
            self.slices.phase(),
            self.yield_interval,
            &self.counters,
        )
    }
}

/// Probes the host once and builds the matching adapter.
pub struct SchedulerBuilder {
    host: Rc<dyn Host>,
    config: SchedulerConfig,
    diagnostics: Option<DiagnosticSink>,
}

impl SchedulerBuilder {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self {
            host,
            config: SchedulerConfig::default(),
            diagnostics: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn build(self) -> Result<Rc<dyn HostAdapter>, SchedulerError> {
        self.config.validate()?;
        let diagnostics = self.diagnostics.unwrap_or_else(tracing_sink);
        let capabilities = self.host.capabilities();
        let report = |capability| (diagnostics)(&Diagnostic::MissingCapability { capability });

        let clock = match high_resolution_clock(&*self.host, capabilities) {
            Some(clock) => clock,
            None => {
                report(Capability::HighResolutionClock);
                self.host.wall_clock()
            }
        };

        let counters = Rc::new(Counters::default());
        let timeouts = TimeoutAdapter::new(self.host.clone(), clock.clone(), counters.clone());

        if self.config.force_fallback || !capabilities.message_channel {
            if !capabilities.message_channel {
                report(Capability::MessageChannel);
            }
            tracing::info!(?capabilities, "using timer-only fallback adapter");
            let slices = FallbackLoop::new(self.host.clone(), clock, counters.clone());
            return Ok(Rc::new(FallbackAdapter {
                slices,
                timeouts,
                yield_interval: self.config.yield_interval_ms,
                counters,
            }));
        }

        if !capabilities.animation_frame {
            report(Capability::AnimationFrame);
        }
        let policy = if self.config.enable_input_pending && capabilities.input_pending {
            YieldPolicy::InputAware
        } else {
            if self.config.enable_input_pending {
                report(Capability::InputPending);
            }
            YieldPolicy::Deadline
        };
        tracing::info!(?capabilities, ?policy, "using interactive adapter");

        let driver = MessageLoopDriver::new(
            self.host.clone(),
            clock,
            DriverOptions {
                policy,
                yield_interval: self.config.yield_interval_ms,
                max_yield_interval: self.config.max_yield_interval_ms,
            },
            counters.clone(),
            diagnostics.clone(),
        );
        Ok(Rc::new(InteractiveAdapter {
            driver,
            timeouts,
            counters,
        }))
    }
}

/// The host's high-resolution source, if it both advertises and provides one.
fn high_resolution_clock(host: &dyn Host, capabilities: HostCapabilities) -> Option<Rc<dyn Clock>> {
    if !capabilities.high_resolution_clock {
        return None;
    }
    host.high_resolution_clock()
}
