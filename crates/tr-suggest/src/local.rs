//! In-process suggestion backend for sandbox mode.
//!
//! Serves uniform random candidates within bounds and judges bestness by the
//! target metric, with no external service attached. Useful for orchestrator
//! development, integration testing, and offline runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use tr_types::config::OptimizationConfig;
use tr_types::filters::MetricMap;
use tr_types::params::{ParamMap, ParameterKind, ParameterSpec, ParameterValue};

use crate::client::{
    RegisterOutcome, SessionId, SuggestError, SuggestResult, Suggestion, SuggestionService,
};

struct LocalSession {
    specs: Vec<ParameterSpec>,
    target_metric: String,
    suggestion_budget: u32,
    suggestions_served: u32,
    best_score: Option<f64>,
    valid_count: u32,
    rng: ChaCha8Rng,
}

struct Inner {
    sessions: HashMap<SessionId, LocalSession>,
    created: u64,
}

/// A fully in-process suggestion engine. Maximizes the target metric.
pub struct LocalSuggestService {
    seed: u64,
    /// When set, sessions run out of suggestions after this many serves even
    /// if the trial budget is larger. Lets tests exercise the exhausted path.
    suggestion_cap: Option<u32>,
    inner: Mutex<Inner>,
}

impl LocalSuggestService {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            suggestion_cap: None,
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                created: 0,
            }),
        }
    }

    /// Create a sandbox service with default settings.
    pub fn with_defaults() -> Self {
        Self::new(42)
    }

    pub fn with_suggestion_cap(mut self, cap: u32) -> Self {
        self.suggestion_cap = Some(cap);
        self
    }

    fn sample(spec: &ParameterSpec, rng: &mut ChaCha8Rng) -> ParameterValue {
        match &spec.kind {
            ParameterKind::Int { min, max } => ParameterValue::Int(rng.gen_range(*min..=*max)),
            ParameterKind::Float { min, max } => {
                ParameterValue::Float(rng.gen_range(*min..=*max))
            }
            ParameterKind::Bool => ParameterValue::Bool(rng.gen_bool(0.5)),
            ParameterKind::Enum { options } => {
                let idx = rng.gen_range(0..options.len());
                ParameterValue::Choice(options[idx].clone())
            }
        }
    }
}

#[async_trait]
impl SuggestionService for LocalSuggestService {
    async fn create_session(
        &self,
        config: &OptimizationConfig,
        cancel: &CancellationToken,
    ) -> SuggestResult<SessionId> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }

        // The sandbox judges configs the way the real service would.
        config
            .validate()
            .map_err(|e| SuggestError::InvalidConfig {
                message: e.to_string(),
            })?;

        let mut inner = self.inner.lock();
        inner.created += 1;
        let rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(inner.created));

        let session_id = Uuid::new_v4().to_string();
        let budget = self
            .suggestion_cap
            .map_or(config.trial_budget, |cap| cap.min(config.trial_budget));
        inner.sessions.insert(
            session_id.clone(),
            LocalSession {
                specs: config.enabled_parameters().cloned().collect(),
                target_metric: config.target_metric.clone(),
                suggestion_budget: budget,
                suggestions_served: 0,
                best_score: None,
                valid_count: 0,
                rng,
            },
        );

        info!(session_id = %session_id, budget, "sandbox suggestion session created");
        Ok(session_id)
    }

    async fn suggest(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> SuggestResult<Suggestion> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }

        let mut inner = self.inner.lock();
        let session = inner.sessions.get_mut(session_id).ok_or_else(|| {
            SuggestError::ServiceUnavailable {
                message: format!("unknown session {session_id}"),
            }
        })?;

        if session.suggestions_served >= session.suggestion_budget {
            debug!(session_id, "sandbox suggestions exhausted");
            return Ok(Suggestion::Exhausted);
        }
        session.suggestions_served += 1;

        let mut candidate = ParamMap::new();
        for spec in &session.specs {
            candidate.insert(spec.id.clone(), Self::sample(spec, &mut session.rng));
        }
        Ok(Suggestion::Candidate(candidate))
    }

    async fn register(
        &self,
        session_id: &str,
        _params: &ParamMap,
        metrics: &MetricMap,
        cancel: &CancellationToken,
    ) -> SuggestResult<RegisterOutcome> {
        if cancel.is_cancelled() {
            return Err(SuggestError::Cancelled);
        }

        let mut inner = self.inner.lock();
        let session = inner.sessions.get_mut(session_id).ok_or_else(|| {
            SuggestError::ServiceUnavailable {
                message: format!("unknown session {session_id}"),
            }
        })?;

        let score = metrics.get(&session.target_metric).copied().flatten();
        let is_valid = score.is_some_and(f64::is_finite);
        let is_best_so_far = match (score, session.best_score) {
            (Some(s), _) if !s.is_finite() => false,
            (Some(s), None) => {
                session.best_score = Some(s);
                true
            }
            (Some(s), Some(best)) if s > best => {
                session.best_score = Some(s);
                true
            }
            _ => false,
        };
        if is_valid {
            session.valid_count += 1;
        }

        debug!(
            session_id,
            valid = is_valid,
            best = is_best_so_far,
            "sandbox trial registered"
        );
        Ok(RegisterOutcome {
            is_valid,
            is_best_so_far,
            total_valid_count: session.valid_count,
        })
    }

    async fn close_session(&self, session_id: &str) -> SuggestResult<()> {
        // Idempotent: closing an unknown or already-closed session is fine.
        let removed = self.inner.lock().sessions.remove(session_id).is_some();
        info!(session_id, removed, "sandbox suggestion session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_types::filters::{Comparator, MetricFilter};

    fn sample_config() -> OptimizationConfig {
        OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("fast_period", 1, 10))
            .with_parameter(ParameterSpec::float("size", 0.5, 1.0))
            .with_parameter(ParameterSpec::choice("mode", vec!["a".into(), "b".into()]))
            .with_filter(MetricFilter::new("netProfit", Comparator::Gte, 0.0))
            .with_trial_budget(5)
    }

    fn metrics_with(target: &str, value: Option<f64>) -> MetricMap {
        let mut m = MetricMap::new();
        m.insert(target.to_string(), value);
        m
    }

    #[tokio::test]
    async fn candidates_respect_bounds() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let sid = service.create_session(&sample_config(), &token).await.unwrap();

        for _ in 0..5 {
            match service.suggest(&sid, &token).await.unwrap() {
                Suggestion::Candidate(params) => {
                    match params.get("fast_period") {
                        Some(ParameterValue::Int(v)) => assert!((1..=10).contains(v)),
                        other => panic!("unexpected fast_period value: {other:?}"),
                    }
                    match params.get("size") {
                        Some(ParameterValue::Float(v)) => assert!((0.5..=1.0).contains(v)),
                        other => panic!("unexpected size value: {other:?}"),
                    }
                    match params.get("mode") {
                        Some(ParameterValue::Choice(v)) => assert!(["a", "b"].contains(&v.as_str())),
                        other => panic!("unexpected mode value: {other:?}"),
                    }
                }
                Suggestion::Exhausted => panic!("exhausted before budget"),
            }
        }
    }

    #[tokio::test]
    async fn exhausts_after_budget() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let config = sample_config().with_trial_budget(2);
        let sid = service.create_session(&config, &token).await.unwrap();

        assert!(matches!(
            service.suggest(&sid, &token).await.unwrap(),
            Suggestion::Candidate(_)
        ));
        assert!(matches!(
            service.suggest(&sid, &token).await.unwrap(),
            Suggestion::Candidate(_)
        ));
        assert_eq!(
            service.suggest(&sid, &token).await.unwrap(),
            Suggestion::Exhausted
        );
    }

    #[tokio::test]
    async fn suggestion_cap_exhausts_early() {
        let service = LocalSuggestService::with_defaults().with_suggestion_cap(2);
        let token = CancellationToken::new();
        let sid = service.create_session(&sample_config(), &token).await.unwrap();

        for _ in 0..2 {
            assert!(matches!(
                service.suggest(&sid, &token).await.unwrap(),
                Suggestion::Candidate(_)
            ));
        }
        assert_eq!(
            service.suggest(&sid, &token).await.unwrap(),
            Suggestion::Exhausted
        );
    }

    #[tokio::test]
    async fn register_tracks_best_by_target_metric() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let sid = service.create_session(&sample_config(), &token).await.unwrap();
        let params = ParamMap::new();

        let first = service
            .register(&sid, &params, &metrics_with("netProfit", Some(10.0)), &token)
            .await
            .unwrap();
        assert!(first.is_valid);
        assert!(first.is_best_so_far);
        assert_eq!(first.total_valid_count, 1);

        let worse = service
            .register(&sid, &params, &metrics_with("netProfit", Some(5.0)), &token)
            .await
            .unwrap();
        assert!(worse.is_valid);
        assert!(!worse.is_best_so_far);
        assert_eq!(worse.total_valid_count, 2);

        let better = service
            .register(&sid, &params, &metrics_with("netProfit", Some(20.0)), &token)
            .await
            .unwrap();
        assert!(better.is_best_so_far);
    }

    #[tokio::test]
    async fn register_with_missing_target_is_invalid() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let sid = service.create_session(&sample_config(), &token).await.unwrap();

        let outcome = service
            .register(&sid, &ParamMap::new(), &metrics_with("netProfit", None), &token)
            .await
            .unwrap();
        assert!(!outcome.is_valid);
        assert!(!outcome.is_best_so_far);
        assert_eq!(outcome.total_valid_count, 0);
    }

    #[tokio::test]
    async fn invalid_config_rejected_at_create() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let config = OptimizationConfig::new("netProfit"); // no parameters
        let result = service.create_session(&config, &token).await;
        assert!(matches!(result, Err(SuggestError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let sid = service.create_session(&sample_config(), &token).await.unwrap();

        token.cancel();
        assert_eq!(
            service.suggest(&sid, &token).await,
            Err(SuggestError::Cancelled)
        );
        assert_eq!(
            service
                .register(&sid, &ParamMap::new(), &MetricMap::new(), &token)
                .await,
            Err(SuggestError::Cancelled)
        );
        // Close still works after cancellation
        assert_eq!(service.close_session(&sid).await, Ok(()));
    }

    #[tokio::test]
    async fn unknown_session_is_unavailable() {
        let service = LocalSuggestService::with_defaults();
        let token = CancellationToken::new();
        let result = service.suggest("nope", &token).await;
        assert!(matches!(
            result,
            Err(SuggestError::ServiceUnavailable { .. })
        ));
    }
}
