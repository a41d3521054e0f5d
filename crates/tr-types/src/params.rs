//! Parameter specifications and concrete parameter values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A concrete parameter assignment keyed by parameter id.
pub type ParamMap = HashMap<String, ParameterValue>;

/// A single tunable parameter on the target system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Stable identifier, unique within a config (e.g. "stop_loss_pct").
    pub id: String,
    /// The kind of value this parameter takes.
    pub kind: ParameterKind,
    /// Disabled parameters are carried in the config but excluded from the
    /// search and from baseline capture.
    pub enabled: bool,
}

/// Describes the value domain of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Integer range [min, max] inclusive.
    Int { min: i64, max: i64 },
    /// Continuous range [min, max].
    Float { min: f64, max: f64 },
    /// On/off switch.
    Bool,
    /// One of a fixed set of named options.
    Enum { options: Vec<String> },
}

impl ParameterSpec {
    pub fn int(id: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            id: id.into(),
            kind: ParameterKind::Int { min, max },
            enabled: true,
        }
    }

    pub fn float(id: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            id: id.into(),
            kind: ParameterKind::Float { min, max },
            enabled: true,
        }
    }

    pub fn toggle(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ParameterKind::Bool,
            enabled: true,
        }
    }

    pub fn choice(id: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            id: id.into(),
            kind: ParameterKind::Enum { options },
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A concrete value for one parameter.
///
/// Serialized untagged so wire payloads carry plain JSON scalars. Variant
/// order matters for deserialization: bools and integers must be tried
/// before floats and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Choice(String),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Choice(v) => write!(f, "{v}"),
        }
    }
}
