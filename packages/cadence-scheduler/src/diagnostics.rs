use serde::Serialize;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Capability {
    MessageChannel,
    InputPending,
    HighResolutionClock,
    AnimationFrame,
}

/// Non-fatal conditions reported to the host. None of these stop scheduling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    /// `set_frame_rate` was called with a value outside `0..=125`.
    FrameRateOutOfRange { fps: f64 },
    /// The host lacks a primitive; the adapter degrades around it.
    MissingCapability { capability: Capability },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FrameRateOutOfRange { fps } => write!(
                f,
                "set_frame_rate takes a frame rate between 0 and 125, got {fps}; \
                 forcing frame rates higher than 125 fps is not supported"
            ),
            Diagnostic::MissingCapability { capability } => {
                write!(f, "host does not provide {capability:?}; degrading")
            }
        }
    }
}

/// Host-supplied channel for diagnostics.
pub type DiagnosticSink = Rc<dyn Fn(&Diagnostic)>;

pub fn tracing_sink() -> DiagnosticSink {
    Rc::new(|diagnostic: &Diagnostic| {
        tracing::warn!(?diagnostic, "{}", diagnostic);
    })
}

/// Keeps every diagnostic it receives, and still logs them.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Rc<RefCell<SmallVec<[Diagnostic; 4]>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> DiagnosticSink {
        let records = self.records.clone();
        Rc::new(move |diagnostic: &Diagnostic| {
            tracing::warn!(?diagnostic, "{}", diagnostic);
            records.borrow_mut().push(diagnostic.clone());
        })
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn contains(&self, diagnostic: &Diagnostic) -> bool {
        self.records.borrow().iter().any(|d| d == diagnostic)
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        self.records.borrow_mut().drain(..).collect()
    }
}
