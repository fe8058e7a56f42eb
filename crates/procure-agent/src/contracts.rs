//! Structured-output contracts
//!
//! Replies requested under a JSON schema are still untrusted text. Decoding
//! runs parse, normalise, validate, deserialize in that order and reports any
//! failure as a [`SchemaMismatch`] value rather than an error, so callers can
//! fall back to a safe default.

use procure_ai::ResponseFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Mode;

/// Why a structured reply could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaMismatch {
    #[error("empty response")]
    Empty,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("schema validation failed: {0}")]
    Invalid(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// A JSON shape the model is asked to produce
pub trait Contract: DeserializeOwned + Sized {
    /// Schema name sent to the provider
    const NAME: &'static str;

    /// JSON Schema of the expected reply
    fn schema() -> Value;

    /// Repair known harmless deviations before validation
    fn normalize(_value: &mut Value) {}

    /// Tidy the decoded value (trim blanks and the like)
    fn finish(self) -> Self {
        self
    }

    /// Response format carrying this contract's schema
    fn response_format() -> ResponseFormat {
        ResponseFormat::json_schema(Self::NAME, Self::schema())
    }
}

/// Decode a structured reply against its contract.
pub fn decode<C: Contract>(text: &str) -> Result<C, SchemaMismatch> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SchemaMismatch::Empty);
    }

    let mut value: Value =
        serde_json::from_str(text).map_err(|e| SchemaMismatch::InvalidJson(e.to_string()))?;
    C::normalize(&mut value);

    let schema = C::schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| SchemaMismatch::Invalid(format!("schema for {} did not compile: {}", C::NAME, e)))?;

    let errors: Vec<String> = validator
        .iter_errors(&value)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();
    if !errors.is_empty() {
        return Err(SchemaMismatch::Invalid(errors.join("; ")));
    }

    serde_json::from_value::<C>(value)
        .map(Contract::finish)
        .map_err(|e| SchemaMismatch::Decode(e.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Intent classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl RouterDecision {
    /// Decision used when classification output is unusable
    pub fn fallback() -> Self {
        Self {
            mode: Mode::Chat,
            company: None,
        }
    }
}

impl Contract for RouterDecision {
    const NAME: &'static str = "router_decision";

    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["chat", "investigate"] },
                "company": { "type": ["string", "null"] }
            },
            "required": ["mode"],
            "additionalProperties": false
        })
    }

    fn finish(self) -> Self {
        Self {
            mode: self.mode,
            company: non_blank(self.company),
        }
    }
}

/// Ordered investigation checklist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationPlan {
    #[serde(default)]
    pub company: Option<String>,
    pub steps: Vec<String>,
}

impl Contract for InvestigationPlan {
    const NAME: &'static str = "investigation_plan";

    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "company": { "type": ["string", "null"] },
                "steps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1
                }
            },
            "required": ["steps"],
            "additionalProperties": false
        })
    }

    /// A bare string in `steps` becomes a one-element list.
    fn normalize(value: &mut Value) {
        if let Some(Value::String(step)) = value.get("steps") {
            let step = step.clone();
            value["steps"] = Value::Array(vec![Value::String(step)]);
        }
    }

    fn finish(self) -> Self {
        Self {
            company: non_blank(self.company),
            steps: self.steps,
        }
    }
}
