//! Acceptance filters over trial metrics.
//!
//! Filters are a user-defined gate layered on top of the suggestion
//! service's own validity judgment: a trial shown as valid to the observer
//! must satisfy both.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metric readings keyed by metric id. `None` means the metric could not be
/// read for this trial; it is not an error, it just fails any filter that
/// references it.
pub type MetricMap = HashMap<String, Option<f64>>;

/// Comparison operator for a metric filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gte,
    Lte,
    Gt,
    Lt,
    Eq,
}

impl Comparator {
    /// Whether `actual` satisfies this comparator against `threshold`.
    /// `Eq` is exact IEEE equality, no epsilon.
    pub fn holds(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Self::Gte => actual >= threshold,
            Self::Lte => actual <= threshold,
            Self::Gt => actual > threshold,
            Self::Lt => actual < threshold,
            Self::Eq => actual == threshold,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
        };
        write!(f, "{s}")
    }
}

/// A single acceptance predicate: `<metric> <comparator> <threshold>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFilter {
    pub metric: String,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl MetricFilter {
    pub fn new(metric: impl Into<String>, comparator: Comparator, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            comparator,
            threshold,
        }
    }
}

/// Outcome of evaluating all filters against one trial's metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// True only if every filter is satisfied.
    pub passed: bool,
    /// One human-readable reason per violated filter, in filter order.
    pub reasons: Vec<String>,
}

/// Evaluate every filter against the metric map. Pure; no side effects.
///
/// A metric that is absent or `None` does not satisfy any filter referencing
/// it and contributes an "unavailable" reason.
pub fn evaluate_filters(metrics: &MetricMap, filters: &[MetricFilter]) -> FilterOutcome {
    let mut reasons = Vec::new();

    for filter in filters {
        match metrics.get(&filter.metric).copied().flatten() {
            None => reasons.push(format!("{} unavailable", filter.metric)),
            Some(actual) => {
                if !filter.comparator.holds(actual, filter.threshold) {
                    reasons.push(format!(
                        "{} = {} (requires {} {})",
                        filter.metric, actual, filter.comparator, filter.threshold
                    ));
                }
            }
        }
    }

    FilterOutcome {
        passed: reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, Option<f64>)]) -> MetricMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn empty_filter_list_always_passes() {
        let outcome = evaluate_filters(&metrics(&[("netProfit", Some(-50.0))]), &[]);
        assert!(outcome.passed);
        assert!(outcome.reasons.is_empty());
    }

    #[test]
    fn passes_when_every_filter_holds() {
        let filters = vec![
            MetricFilter::new("netProfit", Comparator::Gte, 0.0),
            MetricFilter::new("maxDrawdown", Comparator::Lt, 20.0),
        ];
        let m = metrics(&[("netProfit", Some(125.5)), ("maxDrawdown", Some(8.2))]);
        let outcome = evaluate_filters(&m, &filters);
        assert!(outcome.passed);
    }

    #[test]
    fn violation_produces_readable_reason() {
        let filters = vec![MetricFilter::new("netProfit", Comparator::Gte, 0.0)];
        let m = metrics(&[("netProfit", Some(-12.5))]);
        let outcome = evaluate_filters(&m, &filters);
        assert!(!outcome.passed);
        assert_eq!(outcome.reasons, vec!["netProfit = -12.5 (requires >= 0)"]);
    }

    #[test]
    fn null_metric_is_unavailable() {
        let filters = vec![MetricFilter::new("winRate", Comparator::Gt, 0.5)];
        let m = metrics(&[("winRate", None)]);
        let outcome = evaluate_filters(&m, &filters);
        assert!(!outcome.passed);
        assert_eq!(outcome.reasons, vec!["winRate unavailable"]);
    }

    #[test]
    fn missing_metric_is_unavailable() {
        let filters = vec![MetricFilter::new("sharpe", Comparator::Gte, 1.0)];
        let outcome = evaluate_filters(&metrics(&[]), &filters);
        assert!(!outcome.passed);
        assert_eq!(outcome.reasons, vec!["sharpe unavailable"]);
    }

    #[test]
    fn reasons_follow_filter_order() {
        let filters = vec![
            MetricFilter::new("a", Comparator::Gt, 10.0),
            MetricFilter::new("b", Comparator::Lt, 0.0),
            MetricFilter::new("c", Comparator::Gte, 5.0),
        ];
        let m = metrics(&[("a", Some(1.0)), ("b", None), ("c", Some(5.0))]);
        let outcome = evaluate_filters(&m, &filters);
        assert!(!outcome.passed);
        assert_eq!(outcome.reasons.len(), 2);
        assert!(outcome.reasons[0].starts_with("a ="));
        assert_eq!(outcome.reasons[1], "b unavailable");
    }

    #[test]
    fn boundary_semantics_per_comparator() {
        assert!(Comparator::Gte.holds(1.0, 1.0));
        assert!(!Comparator::Gt.holds(1.0, 1.0));
        assert!(Comparator::Lte.holds(1.0, 1.0));
        assert!(!Comparator::Lt.holds(1.0, 1.0));
    }

    #[test]
    fn eq_is_exact() {
        assert!(Comparator::Eq.holds(1.0, 1.0));
        assert!(!Comparator::Eq.holds(1.0 + 1e-9, 1.0));
        // NaN never equals anything, including itself
        assert!(!Comparator::Eq.holds(f64::NAN, f64::NAN));
    }
}
