//! Wire contract for the suggestion service.
//!
//! The service speaks flat camelCase JSON. Parameters travel as typed
//! descriptors; filters travel as two-sided bands, with the unused side left
//! open for single-sided comparators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tr_types::config::OptimizationConfig;
use tr_types::filters::{Comparator, MetricFilter};
use tr_types::params::{ParamMap, ParameterKind, ParameterSpec, ParameterValue};

/// Parameter descriptor as the service expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireParameter {
    pub name: String,
    /// One of "numeric", "boolean", "enum".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub is_integer: bool,
}

impl WireParameter {
    pub fn from_spec(spec: &ParameterSpec) -> Self {
        match &spec.kind {
            ParameterKind::Int { min, max } => Self {
                name: spec.id.clone(),
                kind: "numeric".into(),
                min: Some(*min as f64),
                max: Some(*max as f64),
                options: None,
                is_integer: true,
            },
            ParameterKind::Float { min, max } => Self {
                name: spec.id.clone(),
                kind: "numeric".into(),
                min: Some(*min),
                max: Some(*max),
                options: None,
                is_integer: false,
            },
            ParameterKind::Bool => Self {
                name: spec.id.clone(),
                kind: "boolean".into(),
                min: None,
                max: None,
                options: None,
                is_integer: false,
            },
            ParameterKind::Enum { options } => Self {
                name: spec.id.clone(),
                kind: "enum".into(),
                min: None,
                max: None,
                options: Some(options.clone()),
                is_integer: false,
            },
        }
    }
}

/// Filter as a band over one metric. The band contract has no strict flag,
/// so `>` and `<` are sent as closed bounds; the strict check stays local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFilter {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl WireFilter {
    pub fn from_filter(filter: &MetricFilter) -> Self {
        let (min, max) = match filter.comparator {
            Comparator::Gte | Comparator::Gt => (Some(filter.threshold), None),
            Comparator::Lte | Comparator::Lt => (None, Some(filter.threshold)),
            Comparator::Eq => (Some(filter.threshold), Some(filter.threshold)),
        };
        Self {
            metric: filter.metric.clone(),
            min,
            max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub parameters: Vec<WireParameter>,
    pub target_metric: String,
    pub filters: Vec<WireFilter>,
    pub trial_budget: u32,
}

impl CreateSessionRequest {
    /// Build the request from a validated config. Disabled parameters are
    /// not sent; the service never learns about them.
    pub fn from_config(config: &OptimizationConfig) -> Self {
        Self {
            parameters: config
                .enabled_parameters()
                .map(WireParameter::from_spec)
                .collect(),
            target_metric: config.target_metric.clone(),
            filters: config.filters.iter().map(WireFilter::from_filter).collect(),
            trial_budget: config.trial_budget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    #[serde(default)]
    pub exhausted: bool,
    #[serde(default)]
    pub params: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub params: HashMap<String, serde_json::Value>,
    pub metrics: HashMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub is_valid: bool,
    pub is_best_so_far: bool,
    pub total_valid_count: u32,
}

/// Encode a typed parameter map as plain JSON scalars.
pub fn encode_params(params: &ParamMap) -> HashMap<String, serde_json::Value> {
    params
        .iter()
        .map(|(id, value)| (id.clone(), encode_value(value)))
        .collect()
}

fn encode_value(value: &ParameterValue) -> serde_json::Value {
    match value {
        ParameterValue::Bool(b) => serde_json::Value::Bool(*b),
        ParameterValue::Int(n) => serde_json::Value::from(*n),
        ParameterValue::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ParameterValue::Choice(s) => serde_json::Value::String(s.clone()),
    }
}

/// Decode a candidate parameter map from plain JSON scalars. The value kind
/// is inferred from the JSON type (bools, integers, floats, strings).
pub fn decode_candidate(
    raw: &HashMap<String, serde_json::Value>,
) -> Result<ParamMap, String> {
    let mut params = ParamMap::new();
    for (id, value) in raw {
        let typed: ParameterValue = serde_json::from_value(value.clone())
            .map_err(|_| format!("parameter {id} has unusable value {value}"))?;
        params.insert(id.clone(), typed);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_parameter_wire_shape() {
        let wire = WireParameter::from_spec(&ParameterSpec::int("lookback", 5, 50));
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "lookback",
                "type": "numeric",
                "min": 5.0,
                "max": 50.0,
                "isInteger": true
            })
        );
    }

    #[test]
    fn enum_parameter_wire_shape() {
        let spec = ParameterSpec::choice("mode", vec!["fast".into(), "slow".into()]);
        let json = serde_json::to_value(WireParameter::from_spec(&spec)).unwrap();
        assert_eq!(json["type"], "enum");
        assert_eq!(json["options"], serde_json::json!(["fast", "slow"]));
        assert_eq!(json["isInteger"], serde_json::json!(false));
        assert!(json.get("min").is_none());
    }

    #[test]
    fn filter_band_encoding_per_comparator() {
        let gte = WireFilter::from_filter(&MetricFilter::new("netProfit", Comparator::Gte, 0.0));
        assert_eq!((gte.min, gte.max), (Some(0.0), None));

        let lt = WireFilter::from_filter(&MetricFilter::new("maxDrawdown", Comparator::Lt, 25.0));
        assert_eq!((lt.min, lt.max), (None, Some(25.0)));

        let eq = WireFilter::from_filter(&MetricFilter::new("trades", Comparator::Eq, 40.0));
        assert_eq!((eq.min, eq.max), (Some(40.0), Some(40.0)));
    }

    #[test]
    fn create_request_skips_disabled_parameters() {
        let config = OptimizationConfig::new("netProfit")
            .with_parameter(ParameterSpec::int("a", 1, 10))
            .with_parameter(ParameterSpec::toggle("b").disabled())
            .with_trial_budget(7);
        let request = CreateSessionRequest::from_config(&config);
        assert_eq!(request.parameters.len(), 1);
        assert_eq!(request.trial_budget, 7);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["targetMetric"], "netProfit");
        assert_eq!(json["trialBudget"], 7);
    }

    #[test]
    fn suggest_response_exhausted_parses() {
        let resp: SuggestResponse = serde_json::from_str(r#"{"exhausted": true}"#).unwrap();
        assert!(resp.exhausted);
        assert!(resp.params.is_none());
    }

    #[test]
    fn candidate_roundtrip_through_json_scalars() {
        let mut params = ParamMap::new();
        params.insert("a".into(), ParameterValue::Int(7));
        params.insert("b".into(), ParameterValue::Float(0.25));
        params.insert("c".into(), ParameterValue::Bool(true));
        params.insert("d".into(), ParameterValue::Choice("fast".into()));

        let decoded = decode_candidate(&encode_params(&params)).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn candidate_with_null_value_is_rejected() {
        let mut raw = HashMap::new();
        raw.insert("a".to_string(), serde_json::Value::Null);
        let err = decode_candidate(&raw).unwrap_err();
        assert!(err.contains("a"));
    }

    #[test]
    fn register_request_serializes_null_metrics() {
        let mut metrics = HashMap::new();
        metrics.insert("winRate".to_string(), None::<f64>);
        let request = RegisterRequest {
            params: HashMap::new(),
            metrics,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""winRate":null"#));
    }
}
