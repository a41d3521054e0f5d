//! Simulated target for sandbox mode.
//!
//! Holds a parameter store in memory and derives a deterministic strategy
//! report from it. Useful for orchestrator development, integration testing,
//! and exercising cancellation paths without a real target attached.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tr_types::filters::MetricMap;
use tr_types::params::{ParamMap, ParameterValue};
use tracing::debug;

use crate::adapter::{EvalError, EvalResult, Evaluator};

/// Configuration for the simulated target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTargetConfig {
    /// How long the target takes to recompute after a mutation.
    pub stabilize_delay: Duration,
    /// Hard cap on stabilization; exceeding it fails the trial.
    pub stabilize_timeout: Duration,
    /// Relative metric noise (0.0 = fully deterministic).
    pub noise: f64,
    /// RNG seed so noisy runs are reproducible.
    pub seed: u64,
    /// Metric ids that read as unavailable even when the report has them.
    pub missing_metrics: Vec<String>,
}

impl Default for SimTargetConfig {
    fn default() -> Self {
        Self {
            stabilize_delay: Duration::from_millis(10),
            stabilize_timeout: Duration::from_secs(5),
            noise: 0.0,
            seed: 42,
            missing_metrics: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct SimState {
    params: ParamMap,
    offline: bool,
    rng: ChaCha8Rng,
}

/// A fully in-process evaluation target.
#[derive(Debug)]
pub struct SimEvaluator {
    config: SimTargetConfig,
    state: Mutex<SimState>,
}

impl SimEvaluator {
    pub fn new(config: SimTargetConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            state: Mutex::new(SimState {
                params: ParamMap::new(),
                offline: false,
                rng,
            }),
        }
    }

    /// Create a simulated target with default settings.
    pub fn with_defaults() -> Self {
        Self::new(SimTargetConfig::default())
    }

    /// Preset the parameters the target holds before any run starts, so the
    /// baseline capture has something to read.
    pub fn seed_parameters(&self, params: ParamMap) {
        self.state.lock().params.extend(params);
    }

    /// Simulate the target surface disappearing (tab closed, app quit).
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Parameters currently held by the target.
    pub fn current_parameters(&self) -> ParamMap {
        self.state.lock().params.clone()
    }

    /// Derive the strategy report from the current parameters. Each numeric
    /// contributes its value, toggles contribute a fixed bump, choices their
    /// length; profit is concave in the total so the search has an optimum.
    fn report_for(params: &ParamMap) -> HashMap<String, f64> {
        let base: f64 = params
            .values()
            .map(|v| match v {
                ParameterValue::Int(n) => *n as f64,
                ParameterValue::Float(x) => *x,
                ParameterValue::Bool(true) => 5.0,
                ParameterValue::Bool(false) => 0.0,
                ParameterValue::Choice(s) => s.len() as f64,
            })
            .sum();

        let mut report = HashMap::new();
        report.insert("netProfit".to_string(), 250.0 + 40.0 * base - 1.5 * base * base);
        report.insert("totalTrades".to_string(), (30.0 + base.abs()).round());
        report.insert("winRate".to_string(), (0.40 + base / 200.0).clamp(0.0, 1.0));
        report.insert("maxDrawdown".to_string(), (25.0 - base).max(2.0));
        report
    }
}

#[async_trait]
impl Evaluator for SimEvaluator {
    async fn capture_current_parameters(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> EvalResult<ParamMap> {
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let state = self.state.lock();
        if state.offline {
            return Err(EvalError::TargetUnavailable {
                message: "simulated target is offline".into(),
            });
        }

        let mut captured = ParamMap::new();
        for id in ids {
            match state.params.get(id) {
                Some(value) => {
                    captured.insert(id.clone(), value.clone());
                }
                None => {
                    return Err(EvalError::TargetUnavailable {
                        message: format!("parameter {id} not present on target"),
                    })
                }
            }
        }
        Ok(captured)
    }

    async fn apply_parameters(
        &self,
        params: &ParamMap,
        cancel: &CancellationToken,
    ) -> EvalResult<()> {
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let mut state = self.state.lock();
        if state.offline {
            return Err(EvalError::TargetUnavailable {
                message: "simulated target is offline".into(),
            });
        }

        state.params.extend(params.clone());
        debug!(count = params.len(), "parameters applied to simulated target");
        Ok(())
    }

    async fn await_stable(&self, cancel: &CancellationToken) -> EvalResult<()> {
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        // Wait no longer than the hard timeout, then report the overrun.
        let wait = self.config.stabilize_delay.min(self.config.stabilize_timeout);
        tokio::select! {
            _ = cancel.cancelled() => return Err(EvalError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }

        if self.config.stabilize_delay > self.config.stabilize_timeout {
            return Err(EvalError::EvaluationTimeout {
                timeout_ms: self.config.stabilize_timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn read_metrics(
        &self,
        metric_ids: &[String],
        cancel: &CancellationToken,
    ) -> EvalResult<MetricMap> {
        if cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let mut state = self.state.lock();
        if state.offline {
            return Err(EvalError::TargetUnavailable {
                message: "simulated target is offline".into(),
            });
        }

        let report = Self::report_for(&state.params);
        let noise = self.config.noise;

        let mut readings = MetricMap::new();
        for id in metric_ids {
            if self.config.missing_metrics.contains(id) {
                readings.insert(id.clone(), None);
                continue;
            }
            let value = report.get(id).copied().map(|v| {
                if noise > 0.0 {
                    let jitter: f64 = state.rng.gen_range(-1.0..=1.0);
                    v * (1.0 + noise * jitter)
                } else {
                    v
                }
            });
            readings.insert(id.clone(), value);
        }
        Ok(readings)
    }
}
