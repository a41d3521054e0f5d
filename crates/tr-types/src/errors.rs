use thiserror::Error;

/// Rejection reasons for a run configuration. Raised before a session enters
/// the running state; a config that passes validation never produces one of
/// these mid-run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("target metric is empty")]
    MissingTargetMetric,

    #[error("trial budget must be at least 1, got {given}")]
    InvalidTrialBudget { given: u32 },

    #[error("no enabled parameters")]
    NoEnabledParameters,

    #[error("parameter id is empty")]
    EmptyParameterId,

    #[error("duplicate parameter id: {id}")]
    DuplicateParameter { id: String },

    #[error("malformed bounds for {id}: {detail}")]
    MalformedBounds { id: String, detail: String },

    #[error("enum parameter {id} has no options")]
    EmptyOptions { id: String },

    #[error("filter on {metric}: {detail}")]
    InvalidFilter { metric: String, detail: String },

    #[error("evaluation window start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },
}
