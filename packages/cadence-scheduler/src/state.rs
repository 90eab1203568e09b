use serde::Serialize;

/// Where the slice loop is.
///
/// | from             | event                         | to               |
/// |------------------|-------------------------------|------------------|
/// | `Idle`           | `request_callback`            | `SliceScheduled` |
/// | `SliceScheduled` | continuation, callback set    | `SliceRunning`   |
/// | `SliceScheduled` | continuation, slot empty      | `Idle`           |
/// | `SliceRunning`   | more work, error, or replaced | `SliceScheduled` |
/// | `SliceRunning`   | no more work                  | `Idle`           |
///
/// `request_callback` while `SliceScheduled` only swaps the stored callback.
/// While `SliceRunning` the interactive loop lets the new callback supersede
/// the running one; the fallback adapter defers it to a later tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoopPhase {
    #[default]
    Idle,
    SliceScheduled,
    SliceRunning,
}

impl LoopPhase {
    /// True while a continuation is queued or being delivered.
    pub fn is_running(self) -> bool {
        self != LoopPhase::Idle
    }
}
