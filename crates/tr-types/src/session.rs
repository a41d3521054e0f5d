//! Session lifecycle states and per-trial records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::OptimizationConfig;
use crate::filters::MetricMap;
use crate::params::ParamMap;

/// Unique identifier for one orchestrated run.
pub type RunId = Uuid;

/// Lifecycle state of the optimization session.
///
/// Exactly one session exists at a time; terminal states are reported and
/// the orchestrator then returns to `Idle`, discarding the session object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    /// Cancellation requested; the loop is winding down.
    Stopping,
    Stopped,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one completed trial. Trial 0 is the baseline (the parameters
/// the target already held); 1..=N are suggested trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_number: u32,
    pub parameters: ParamMap,
    pub metrics: MetricMap,
    /// Service validity judgment folded with the local filter pass, so what
    /// the observer sees reflects both.
    pub is_valid: bool,
    /// Set by the suggestion service; never recomputed locally.
    pub is_best_so_far: bool,
    /// One reason per violated local filter.
    pub filter_reasons: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// One human-readable journal line (status transitions, best updates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Point-in-time view of the session for a (re)connecting observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub config: Option<OptimizationConfig>,
    pub history: Vec<TrialRecord>,
    pub best: Option<TrialRecord>,
    pub journal: Vec<LogEntry>,
}

/// Summary returned to the caller when a run finishes, however it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub run_id: RunId,
    pub final_state: SessionState,
    /// Trials committed to history, baseline included.
    pub trials_completed: u32,
    pub best: Option<TrialRecord>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
