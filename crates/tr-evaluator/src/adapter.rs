//! Evaluation adapter abstraction.
//!
//! The orchestrator never touches the target system directly: everything goes
//! through this contract, implemented externally (browser automation, an IDE
//! plugin, a terminal fixture) or in-process for sandbox mode (see
//! [`super::sim::SimEvaluator`]).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tr_types::filters::MetricMap;
use tr_types::params::ParamMap;

/// Errors surfaced by evaluator operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("target unavailable: {message}")]
    TargetUnavailable { message: String },
    #[error("target did not stabilize within {timeout_ms} ms")]
    EvaluationTimeout { timeout_ms: u64 },
    #[error("evaluation cancelled")]
    Cancelled,
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvalError>;

/// Contract between the orchestrator and the target system.
///
/// Every operation samples the cancellation token at entry and, where it
/// waits internally, during the wait; a cancelled token surfaces as
/// [`EvalError::Cancelled`]. An in-flight operation is never hard-aborted
/// from outside: cancellation is observed cooperatively.
///
/// No operation retries on its own. A failure here aborts the whole run; the
/// orchestrator surfaces it rather than skipping the trial.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Read the parameter values the target currently holds, for the ids
    /// given. Used once per run to build the baseline trial. Fails with
    /// [`EvalError::TargetUnavailable`] if the target cannot be read.
    async fn capture_current_parameters(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> EvalResult<ParamMap>;

    /// Write a candidate parameter set onto the target.
    async fn apply_parameters(
        &self,
        params: &ParamMap,
        cancel: &CancellationToken,
    ) -> EvalResult<()>;

    /// Suspend until the target has finished reacting to the last mutation,
    /// bounded by a hard timeout ([`EvalError::EvaluationTimeout`]).
    async fn await_stable(&self, cancel: &CancellationToken) -> EvalResult<()>;

    /// Read the requested metrics. A metric that cannot be located reads as
    /// `None`; only a missing metric surface altogether is an error
    /// ([`EvalError::TargetUnavailable`]).
    async fn read_metrics(
        &self,
        metric_ids: &[String],
        cancel: &CancellationToken,
    ) -> EvalResult<MetricMap>;
}
