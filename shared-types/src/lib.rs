//! Shared types between the agent pipeline and the evaluation harness
//!
//! These types are used by both:
//! - the two-stage query pipeline (contract selection + call generation)
//! - the test runner and its evaluation/metrics engine
//!
//! Serializable with serde; field names follow the JSON test-case and
//! enhanced-ABI file formats.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Parameter Values
// ============================================================================

/// Dynamically-typed function parameter value.
///
/// A closed set of shapes: anything the test-case files or the call generator
/// can put in a `parameters` object maps onto one of these variants.
///
/// Numbers keep their source digits, so amounts beyond `u64` stay exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    #[default]
    Null,
    Boolean(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<ParamValue>),
    Mapping(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for ParamValue {
    /// Non-finite floats have no JSON number form and become `Null`.
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or(Self::Null)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

// Decoded through `serde_json::Value`: untagged derives buffer numbers and
// lose their exact form.
impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Named parameters of one function call. Key order carries no meaning.
pub type ParameterSet = BTreeMap<String, ParamValue>;

// ============================================================================
// Function Calls
// ============================================================================

fn default_attached_value() -> ParamValue {
    ParamValue::text("0")
}

/// One proposed contract function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(rename = "function_name", default)]
    pub name: String,
    #[serde(default)]
    pub parameters: ParameterSet,
    /// Native value attached to the call (payable functions), decimal string.
    #[serde(rename = "value", default = "default_attached_value")]
    pub attached_value: ParamValue,
    /// Free-form explanation from the generator. Never scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: ParameterSet::new(),
            attached_value: default_attached_value(),
            reasoning: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<ParamValue>) -> Self {
        self.attached_value = value.into();
        self
    }
}

/// Wire wrapper used by test-case files and the call generator:
/// `{"function_calling": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallPlan {
    #[serde(default)]
    pub function_calling: Vec<FunctionCall>,
}

// ============================================================================
// Candidate Contracts
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Documentation-enriched metadata for one exposed contract function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    #[serde(
        rename = "stateMutability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_mutability: Option<String>,
}

/// A contract eligible for selection against a user query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateContract {
    /// Unique key.
    pub address: String,
    #[serde(rename = "contract_id", default)]
    pub identifier: String,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionMetadata>,
}

impl CandidateContract {
    pub fn new(address: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identifier: identifier.into(),
            functions: BTreeMap::new(),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.functions.insert(
            name.into(),
            FunctionMetadata {
                description: description.into(),
                ..FunctionMetadata::default()
            },
        );
        self
    }
}

// ============================================================================
// Test Cases & Agent Results
// ============================================================================

/// Ground-truth record from the test-case file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "test_case_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "natural_language_query", default)]
    pub query: String,
    #[serde(default)]
    pub expected_rewritten_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumed_contract_id: Option<String>,
    #[serde(rename = "assumed_contract_address", default)]
    pub expected_contract_address: String,
    #[serde(rename = "ground_truth_function_calls", default)]
    pub ground_truth: FunctionCallPlan,
}

impl TestCase {
    pub fn ground_truth_calls(&self) -> &[FunctionCall] {
        &self.ground_truth.function_calling
    }
}

/// How stage-1 contract selection arrived at its shortlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Model,
    Heuristic,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Outcome of one agent execution. Created once per attempt, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_contract_address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_contracts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_method: Option<SelectionMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_calls: Option<Vec<FunctionCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn produced_calls(&self) -> &[FunctionCall] {
        self.produced_calls.as_deref().unwrap_or(&[])
    }
}
