//! Run configuration: what to tune, what to optimize for, when to stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ConfigError;
use crate::filters::MetricFilter;
use crate::params::{ParameterKind, ParameterSpec};

/// Optional date range the evaluator should score trials over. The core loop
/// validates and persists it; interpreting it is up to the evaluator
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Top-level configuration for one optimization run. Built once per run
/// request and immutable for the run's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Parameters the run may tune. Disabled entries ride along untouched.
    pub parameters: Vec<ParameterSpec>,

    /// Metric id the suggestion engine optimizes (e.g. "netProfit").
    pub target_metric: String,

    /// Acceptance filters applied locally on top of the service's judgment.
    pub filters: Vec<MetricFilter>,

    /// Maximum number of suggested trials (the baseline is extra).
    pub trial_budget: u32,

    /// Optional evaluation window forwarded to the evaluator.
    pub evaluation_window: Option<EvaluationWindow>,

    pub created_at: DateTime<Utc>,
}

impl OptimizationConfig {
    pub fn new(target_metric: impl Into<String>) -> Self {
        Self {
            parameters: Vec::new(),
            target_metric: target_metric.into(),
            filters: Vec::new(),
            trial_budget: 20,
            evaluation_window: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn with_filter(mut self, filter: MetricFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_trial_budget(mut self, n: u32) -> Self {
        self.trial_budget = n;
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.evaluation_window = Some(EvaluationWindow { start, end });
        self
    }

    /// Parameters that take part in the search.
    pub fn enabled_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|p| p.enabled)
    }

    /// Ids of enabled parameters, in declaration order.
    pub fn enabled_ids(&self) -> Vec<String> {
        self.enabled_parameters().map(|p| p.id.clone()).collect()
    }

    /// Every metric id a trial needs: the target metric first, then filter
    /// metrics, deduplicated in declaration order.
    pub fn metric_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(1 + self.filters.len());
        seen.insert(self.target_metric.clone());
        ids.push(self.target_metric.clone());
        for filter in &self.filters {
            if seen.insert(filter.metric.clone()) {
                ids.push(filter.metric.clone());
            }
        }
        ids
    }

    /// Check the config is well-formed. Runs before any session starts; a
    /// failure here never reaches the trial loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_metric.is_empty() {
            return Err(ConfigError::MissingTargetMetric);
        }
        if self.trial_budget < 1 {
            return Err(ConfigError::InvalidTrialBudget {
                given: self.trial_budget,
            });
        }
        if self.enabled_parameters().count() == 0 {
            return Err(ConfigError::NoEnabledParameters);
        }

        let mut ids = HashSet::new();
        for param in &self.parameters {
            if param.id.is_empty() {
                return Err(ConfigError::EmptyParameterId);
            }
            if !ids.insert(param.id.as_str()) {
                return Err(ConfigError::DuplicateParameter {
                    id: param.id.clone(),
                });
            }
            match &param.kind {
                ParameterKind::Int { min, max } => {
                    if min > max {
                        return Err(ConfigError::MalformedBounds {
                            id: param.id.clone(),
                            detail: format!("min {min} > max {max}"),
                        });
                    }
                }
                ParameterKind::Float { min, max } => {
                    if !min.is_finite() || !max.is_finite() {
                        return Err(ConfigError::MalformedBounds {
                            id: param.id.clone(),
                            detail: "bounds must be finite".into(),
                        });
                    }
                    if min > max {
                        return Err(ConfigError::MalformedBounds {
                            id: param.id.clone(),
                            detail: format!("min {min} > max {max}"),
                        });
                    }
                }
                ParameterKind::Bool => {}
                ParameterKind::Enum { options } => {
                    if options.is_empty() {
                        return Err(ConfigError::EmptyOptions {
                            id: param.id.clone(),
                        });
                    }
                }
            }
        }

        for filter in &self.filters {
            if filter.metric.is_empty() {
                return Err(ConfigError::InvalidFilter {
                    metric: filter.metric.clone(),
                    detail: "metric id is empty".into(),
                });
            }
            if !filter.threshold.is_finite() {
                return Err(ConfigError::InvalidFilter {
                    metric: filter.metric.clone(),
                    detail: format!("threshold {} is not finite", filter.threshold),
                });
            }
        }

        if let Some(window) = &self.evaluation_window {
            if window.start > window.end {
                return Err(ConfigError::InvalidWindow {
                    start: window.start.to_rfc3339(),
                    end: window.end.to_rfc3339(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Comparator;

    fn sample_config() -> OptimizationConfig {
        OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("fast_period", 1, 10))
            .with_parameter(ParameterSpec::int("slow_period", 0, 5))
            .with_filter(MetricFilter::new("netProfit", Comparator::Gte, 0.0))
            .with_trial_budget(3)
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(sample_config().validate(), Ok(()));
    }

    #[test]
    fn zero_enabled_parameters_rejected() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("a", 1, 10).disabled())
            .with_trial_budget(5);
        assert_eq!(config.validate(), Err(ConfigError::NoEnabledParameters));
    }

    #[test]
    fn malformed_int_bounds_rejected() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("a", 10, 1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedBounds { .. })
        ));
    }

    #[test]
    fn non_finite_float_bounds_rejected() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::float("a", 0.0, f64::INFINITY));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MalformedBounds { .. })
        ));
    }

    #[test]
    fn zero_trial_budget_rejected() {
        let config = sample_config().with_trial_budget(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTrialBudget { given: 0 })
        );
    }

    #[test]
    fn duplicate_parameter_ids_rejected() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("a", 1, 5))
            .with_parameter(ParameterSpec::float("a", 0.0, 1.0));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateParameter { id: "a".into() })
        );
    }

    #[test]
    fn empty_enum_options_rejected() {
        let config =
            OptimizationConfig::new("netProfit").with_parameter(ParameterSpec::choice("mode", vec![]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyOptions { id: "mode".into() })
        );
    }

    #[test]
    fn inverted_window_rejected() {
        let end = Utc::now();
        let start = end + chrono::Duration::days(1);
        let config = sample_config().with_window(start, end);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn metric_ids_dedup_with_target_first() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("a", 1, 2))
            .with_filter(MetricFilter::new("maxDrawdown", Comparator::Lt, 25.0))
            .with_filter(MetricFilter::new("netProfit", Comparator::Gte, 0.0))
            .with_filter(MetricFilter::new("winRate", Comparator::Gt, 0.4));
        assert_eq!(config.metric_ids(), vec!["netProfit", "maxDrawdown", "winRate"]);
    }

    #[test]
    fn enabled_ids_skip_disabled() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("a", 1, 2))
            .with_parameter(ParameterSpec::toggle("b").disabled())
            .with_parameter(ParameterSpec::float("c", 0.0, 1.0));
        assert_eq!(config.enabled_ids(), vec!["a", "c"]);
    }
}
