//! # ENGINE CONFIGURATION
//!
//! Serializable description of a base [`Context`]: the recognized marker
//! shapes, whether declared types are enforced, and literal values injected by
//! parameter name.

use crate::dependencies::{Context, MarkerSet, MarkerShape, Overrides};
use crate::types::Values;
use crate::validation::RuleValidator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Marker shape names; `Depends` and `Security` are built in, any other
    /// name is read structurally.
    #[serde(default = "default_markers")]
    pub recognized_markers: Vec<String>,
    /// Reject candidates whose runtime type differs from the declared type.
    #[serde(default)]
    pub strict_types: bool,
    #[serde(default)]
    pub values: Map<String, JsonValue>,
}

fn default_markers() -> Vec<String> {
    vec![MarkerShape::DEPENDS.to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recognized_markers: default_markers(),
            strict_types: false,
            values: Map::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn marker_set(&self) -> MarkerSet {
        MarkerSet::new(
            self.recognized_markers
                .iter()
                .map(|name| MarkerShape::named(name)),
        )
    }

    /// Configured values as injectable values: strings become `String`,
    /// integers `i64`, floats `f64`, booleans `bool`; anything else stays a
    /// `serde_json::Value`.
    pub fn values(&self) -> Values {
        let mut values = Values::new();
        for (name, value) in &self.values {
            match value {
                JsonValue::String(text) => values.insert(name.clone(), text.clone()),
                JsonValue::Bool(flag) => values.insert(name.clone(), *flag),
                JsonValue::Number(number) => {
                    if let Some(integer) = number.as_i64() {
                        values.insert(name.clone(), integer);
                    } else if let Some(float) = number.as_f64() {
                        values.insert(name.clone(), float);
                    } else {
                        values.insert(name.clone(), value.clone());
                    }
                }
                other => values.insert(name.clone(), other.clone()),
            }
        }
        values
    }

    /// Base context described by this configuration.
    pub fn build_context(&self) -> Context {
        let mut overrides = Overrides::new()
            .values(self.values())
            .markers(self.marker_set());
        if self.strict_types {
            overrides = overrides.validator(RuleValidator::new().strict());
        }
        log::debug!(
            "built context with {} values, markers {:?}",
            self.values.len(),
            self.recognized_markers
        );
        Context::empty().derive(overrides)
    }
}
