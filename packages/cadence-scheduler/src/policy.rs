use crate::clock::Time;
use crate::config::MAX_FRAME_RATE;
use crate::error::SchedulerError;
use serde::Serialize;

/// How an adapter answers "yield now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum YieldPolicy {
    /// Past the deadline, yield only if the host has paint or input waiting,
    /// or once the hard ceiling is reached.
    InputAware,
    /// No way to see pending input: yield whenever the deadline has passed.
    Deadline,
    /// Timer-only hosts. Slice boundaries come from re-invocation alone.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldInputs {
    pub now: Time,
    pub deadline: Time,
    pub needs_paint: bool,
    pub max_yield_interval: Time,
}

impl YieldPolicy {
    /// `input_pending` is only consulted once the deadline has passed.
    pub fn should_yield(self, inputs: YieldInputs, input_pending: impl FnOnce() -> bool) -> bool {
        match self {
            YieldPolicy::Never => false,
            YieldPolicy::Deadline => inputs.now >= inputs.deadline,
            YieldPolicy::InputAware => {
                if inputs.now < inputs.deadline {
                    return false;
                }
                if inputs.needs_paint || input_pending() {
                    return true;
                }
                // Paints that never went through request_paint are still
                // picked up once this ceiling is crossed.
                inputs.now >= inputs.max_yield_interval
            }
        }
    }

    /// Whether `request_paint` has any effect under this policy.
    pub fn tracks_paint(self) -> bool {
        matches!(self, YieldPolicy::InputAware)
    }
}

/// Maps a frame rate onto a slice length.
///
/// `0` resets to `default_interval`. Negative, non-finite and above-125 rates
/// are rejected.
pub fn yield_interval_for_frame_rate(fps: f64, default_interval: Time) -> Result<Time, SchedulerError> {
    if fps.is_nan() || fps < 0.0 || fps > MAX_FRAME_RATE {
        return Err(SchedulerError::InvalidFrameRate { fps });
    }
    if fps > 0.0 {
        Ok((1000.0 / fps).floor())
    } else {
        Ok(default_interval)
    }
}
