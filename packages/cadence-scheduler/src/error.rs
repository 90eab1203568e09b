use thiserror::Error;

/// Failure raised by a single unit of scheduled work.
#[derive(Debug, Error)]
pub enum WorkError {
    #[error("{0}")]
    Failed(String),

    #[error("work unit panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    pub fn msg(message: impl Into<String>) -> Self {
        WorkError::Failed(message.into())
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A slice failed. The loop has already been rescheduled.
    #[error("slice failed: {0}")]
    Work(#[from] WorkError),

    #[error("timeout callback failed: {0}")]
    Timeout(WorkError),

    #[error("frame rate {fps} is outside 0..=125")]
    InvalidFrameRate { fps: f64 },

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// The underlying work failure, if this error came from a callback.
    pub fn work_error(&self) -> Option<&WorkError> {
        match self {
            SchedulerError::Work(e) | SchedulerError::Timeout(e) => Some(e),
            _ => None,
        }
    }
}
