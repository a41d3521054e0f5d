//! Session orchestrator that ties a [`SuggestionService`] and an
//! [`Evaluator`] together in the trial loop.
//!
//! One session at a time: the orchestrator owns the session state machine,
//! drives baseline-then-suggested trials against the live target, and
//! publishes progress through an [`EventSink`]. Cancellation is cooperative:
//! a single token is passed into every external call and sampled at entry,
//! so an in-flight call finishes (or times out) before the loop winds down.

use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tr_evaluator::adapter::Evaluator;
use tr_store::SnapshotStore;
use tr_suggest::client::{RegisterOutcome, SessionId, Suggestion, SuggestionService};
use tr_types::config::OptimizationConfig;
use tr_types::filters::{evaluate_filters, MetricMap};
use tr_types::params::ParamMap;
use tr_types::session::{SessionReport, SessionSnapshot, SessionState, TrialRecord};

use crate::errors::{SessionError, SessionResult};
use crate::events::EventSink;

/// How the trial loop ran out of work.
enum LoopEnd {
    BudgetDone,
    Exhausted,
}

/// The optimization session orchestrator. Generic over the suggestion
/// service and the evaluator so callers can plug in the HTTP client and a
/// real target adapter, or the in-process sandbox pair for offline runs.
pub struct SessionOrchestrator<S: SuggestionService, E: Evaluator> {
    suggest: S,
    evaluator: E,
    sink: EventSink,
    store: Option<SnapshotStore>,
    state: RwLock<SessionState>,
    /// Cancellation handle for the in-flight run; `Some` only while a run
    /// is live.
    active: RwLock<Option<CancellationToken>>,
    last_config: RwLock<Option<OptimizationConfig>>,
}

impl<S: SuggestionService, E: Evaluator> SessionOrchestrator<S, E> {
    pub fn new(suggest: S, evaluator: E, sink: EventSink) -> Self {
        Self {
            suggest,
            evaluator,
            sink,
            store: None,
            state: RwLock::new(SessionState::Idle),
            active: RwLock::new(None),
            last_config: RwLock::new(None),
        }
    }

    /// Attach a snapshot store. Persistence is best-effort: a write failure
    /// is logged and never fails the run.
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run one optimization session to its terminal state.
    ///
    /// Returns an error only for pre-run rejections (`AlreadyRunning`,
    /// invalid config). A run that started always produces a
    /// [`SessionReport`], whether it completed, was stopped, or failed.
    pub async fn run(&self, config: OptimizationConfig) -> SessionResult<SessionReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let cancel = CancellationToken::new();

        // Reentry is rejected before validation, so a second start can never
        // disturb the live session's history or best result.
        {
            let mut state = self.state.write();
            if *state != SessionState::Idle {
                return Err(SessionError::AlreadyRunning);
            }
            config.validate()?;
            *state = SessionState::Running;
            *self.active.write() = Some(cancel.clone());
        }

        *self.last_config.write() = Some(config.clone());
        self.sink.reset();
        self.sink.publish_status(
            SessionState::Running,
            Some("optimization session started".into()),
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.persist_config(&config) {
                warn!(error = %e, "config snapshot failed");
            }
        }

        info!(
            run_id = %run_id,
            target = %config.target_metric,
            budget = config.trial_budget,
            "optimization session started"
        );

        let mut service_session: Option<SessionId> = None;
        let outcome = self
            .drive_trials(&config, &cancel, &mut service_session)
            .await;

        // Cleanup runs however the loop exited. Closing the service session
        // is deliberately not gated on the cancellation token.
        if let Some(sid) = &service_session {
            if let Err(e) = self.suggest.close_session(sid).await {
                warn!(session_id = %sid, error = %e, "close session failed");
            }
        }

        let best = self.sink.best_result();
        if let Some(record) = &best {
            self.sink.publish_best(record.clone());
        }

        let (final_state, message, error) = match &outcome {
            // A cancel that lands after the last trial still wins.
            Ok(_) if cancel.is_cancelled() => {
                (SessionState::Stopped, "stopped by user".to_string(), None)
            }
            Ok(LoopEnd::BudgetDone) => (
                SessionState::Completed,
                "trial budget completed".to_string(),
                None,
            ),
            Ok(LoopEnd::Exhausted) => (
                SessionState::Completed,
                "suggestion service exhausted".to_string(),
                None,
            ),
            Err(e) if e.is_cancellation() => {
                (SessionState::Stopped, "stopped by user".to_string(), None)
            }
            Err(e) => (SessionState::Failed, e.to_string(), Some(e.to_string())),
        };

        self.sink.publish_status(final_state, Some(message));

        if let Some(store) = &self.store {
            if let Err(e) = store.persist_journal(&self.sink.journal()) {
                warn!(error = %e, "journal snapshot failed");
            }
        }

        let trials_completed = self.sink.total_recorded();
        let finished_at = Utc::now();

        // Back to idle; history and best stay visible until the next run.
        *self.state.write() = SessionState::Idle;
        *self.active.write() = None;
        self.sink.publish_status(SessionState::Idle, None);

        info!(
            run_id = %run_id,
            state = %final_state,
            trials = trials_completed,
            "optimization session finished"
        );

        Ok(SessionReport {
            run_id,
            final_state,
            trials_completed,
            best,
            error,
            started_at,
            finished_at,
        })
    }

    /// Request cancellation of the running session. No-op unless the state
    /// is `Running`; returns whether a cancellation was actually requested.
    pub fn cancel(&self) -> bool {
        let token = {
            let mut state = self.state.write();
            if *state != SessionState::Running {
                return false;
            }
            *state = SessionState::Stopping;
            self.active.read().clone()
        };

        if let Some(token) = token {
            token.cancel();
        }
        self.sink.publish_status(
            SessionState::Stopping,
            Some("cancellation requested".into()),
        );
        info!("cancellation requested");
        true
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Point-in-time view for a (re)connecting observer.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            config: self.last_config.read().clone(),
            history: self.sink.history(),
            best: self.sink.best_result(),
            journal: self.sink.journal(),
        }
    }

    pub fn sink(&self) -> &EventSink {
        &self.sink
    }

    async fn drive_trials(
        &self,
        config: &OptimizationConfig,
        cancel: &CancellationToken,
        service_session: &mut Option<SessionId>,
    ) -> SessionResult<LoopEnd> {
        let enabled_ids = config.enabled_ids();
        let metric_ids = config.metric_ids();

        // 1. Baseline: measure the target as found, before anything is written.
        let baseline_params = self
            .evaluator
            .capture_current_parameters(&enabled_ids, cancel)
            .await?;
        let baseline_metrics = self.evaluator.read_metrics(&metric_ids, cancel).await?;

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        // 2. Open the service session and register the baseline under it.
        let sid = self.suggest.create_session(config, cancel).await?;
        *service_session = Some(sid.clone());

        let outcome = self
            .suggest
            .register(&sid, &baseline_params, &baseline_metrics, cancel)
            .await?;
        self.commit_trial(config, 0, baseline_params, baseline_metrics, outcome);

        // 3. Suggested trials, one at a time against the shared target.
        for trial in 1..=config.trial_budget {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }

            let candidate = match self.suggest.suggest(&sid, cancel).await? {
                Suggestion::Candidate(params) => params,
                Suggestion::Exhausted => {
                    debug!(trial, "suggestion service exhausted");
                    return Ok(LoopEnd::Exhausted);
                }
            };

            self.evaluator.apply_parameters(&candidate, cancel).await?;
            self.evaluator.await_stable(cancel).await?;
            let metrics = self.evaluator.read_metrics(&metric_ids, cancel).await?;

            let outcome = self
                .suggest
                .register(&sid, &candidate, &metrics, cancel)
                .await?;
            self.commit_trial(config, trial, candidate, metrics, outcome);
        }

        Ok(LoopEnd::BudgetDone)
    }

    /// Fold the service judgment with the local filter pass, append the
    /// record, and publish it.
    fn commit_trial(
        &self,
        config: &OptimizationConfig,
        trial_number: u32,
        parameters: ParamMap,
        metrics: MetricMap,
        outcome: RegisterOutcome,
    ) {
        let filter_outcome = evaluate_filters(&metrics, &config.filters);
        let record = TrialRecord {
            trial_number,
            parameters,
            metrics,
            is_valid: outcome.is_valid && filter_outcome.passed,
            is_best_so_far: outcome.is_best_so_far,
            filter_reasons: filter_outcome.reasons,
            completed_at: Utc::now(),
        };

        debug!(
            trial = trial_number,
            valid = record.is_valid,
            best = record.is_best_so_far,
            "trial registered"
        );
        self.sink
            .record_trial(record, trial_number, config.trial_budget);

        if let Some(store) = &self.store {
            if let Err(e) = store.persist_history(&self.sink.history()) {
                warn!(error = %e, "history snapshot failed");
            }
        }
    }
}
