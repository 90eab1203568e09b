use crate::adapter::AdapterMode;
use crate::clock::Time;
use crate::policy::YieldPolicy;
use crate::state::LoopPhase;
use serde::Serialize;
use std::cell::Cell;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub slices_run: Cell<u64>,
    pub slices_failed: Cell<u64>,
    pub continuations_posted: Cell<u64>,
    pub yields_signalled: Cell<u64>,
    pub timeouts_requested: Cell<u64>,
    pub timeouts_fired: Cell<u64>,
    pub timeouts_cancelled: Cell<u64>,
    pub requests_deferred: Cell<u64>,
}

pub(crate) fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// Point-in-time view of an adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub mode: AdapterMode,
    pub policy: YieldPolicy,
    pub phase: LoopPhase,
    pub yield_interval_ms: Time,
    pub slices_run: u64,
    pub slices_failed: u64,
    pub continuations_posted: u64,
    pub yields_signalled: u64,
    pub timeouts_requested: u64,
    pub timeouts_fired: u64,
    pub timeouts_cancelled: u64,
    pub requests_deferred: u64,
}

impl SchedulerStats {
    pub(crate) fn collect(
        mode: AdapterMode,
        policy: YieldPolicy,
        phase: LoopPhase,
        yield_interval_ms: Time,
        counters: &Counters,
    ) -> Self {
        Self {
            mode,
            policy,
            phase,
            yield_interval_ms,
            slices_run: counters.slices_run.get(),
            slices_failed: counters.slices_failed.get(),
            continuations_posted: counters.continuations_posted.get(),
            yields_signalled: counters.yields_signalled.get(),
            timeouts_requested: counters.timeouts_requested.get(),
            timeouts_fired: counters.timeouts_fired.get(),
            timeouts_cancelled: counters.timeouts_cancelled.get(),
            requests_deferred: counters.requests_deferred.get(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
