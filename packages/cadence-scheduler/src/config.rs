use crate::clock::Time;
use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_YIELD_INTERVAL_MS: Time = 5.0;
pub const MAX_YIELD_INTERVAL_MS: Time = 300.0;
pub const MAX_FRAME_RATE: f64 = 125.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Slice length. Also the value `set_frame_rate(0)` resets to.
    pub yield_interval_ms: Time,
    /// Hard ceiling that forces a yield even when the host reports no work.
    pub max_yield_interval_ms: Time,
    /// Consult the host's input-pending query when it has one.
    pub enable_input_pending: bool,
    /// Use the timer-only adapter even on a capable host.
    pub force_fallback: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            yield_interval_ms: DEFAULT_YIELD_INTERVAL_MS,
            max_yield_interval_ms: MAX_YIELD_INTERVAL_MS,
            enable_input_pending: true,
            force_fallback: false,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SchedulerError> {
        let config: SchedulerConfig = serde_json::from_str(json)
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !(self.yield_interval_ms.is_finite() && self.yield_interval_ms > 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "yield_interval_ms must be positive, got {}",
                self.yield_interval_ms
            )));
        }
        if !(self.max_yield_interval_ms.is_finite() && self.max_yield_interval_ms > 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_yield_interval_ms must be positive, got {}",
                self.max_yield_interval_ms
            )));
        }
        Ok(())
    }
}
