//! Error types shared across Browse crates.

/// Why a step callback asked the engine to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StepInterrupt {
    /// The user pressed quit.
    #[error("quit requested")]
    QuitRequested,
    /// The user chose to stop from an intervention prompt.
    #[error("stopped by user")]
    StoppedByUser,
}

/// Errors surfaced by an automation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The step callback interrupted the run. Not a failure.
    #[error("run cancelled: {0}")]
    Cancelled(StepInterrupt),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine is not started")]
    NotStarted,

    #[error("engine protocol error: {0}")]
    Protocol(String),

    /// The engine reported a failure of its own.
    #[error("{0}")]
    Failed(String),
}

impl EngineError {
    /// Returns the interrupt if this error is a user-requested cancellation.
    pub fn interrupt(&self) -> Option<StepInterrupt> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Errors surfaced by a language model service.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}
