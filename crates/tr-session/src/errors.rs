use thiserror::Error;

use tr_evaluator::adapter::EvalError;
use tr_suggest::client::SuggestError;
use tr_types::errors::ConfigError;

/// Everything a run can fail with, from any boundary it crossed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("suggestion service: {0}")]
    Suggest(#[from] SuggestError),

    #[error("evaluation: {0}")]
    Evaluation(#[from] EvalError),

    #[error("an optimization session is already running")]
    AlreadyRunning,

    #[error("session cancelled")]
    Cancelled,
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// True when the error is the cooperative cancellation signal, whichever
    /// layer it surfaced through. Cancellation ends a run as `Stopped`, not
    /// `Failed`.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Suggest(SuggestError::Cancelled)
                | Self::Evaluation(EvalError::Cancelled)
        )
    }
}
