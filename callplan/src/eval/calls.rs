//! Position-wise comparison of function-call sequences.

use serde::{Deserialize, Serialize};
use shared_types::FunctionCall;

use super::normalize::normalize;
use super::params::compare_parameters;

const NAME_WEIGHT: f64 = 0.4;
const PARAMETER_WEIGHT: f64 = 0.4;
const VALUE_WEIGHT: f64 = 0.2;

/// Per-call parameter similarity required for an exact sequence match.
pub const EXACT_PARAMETER_THRESHOLD: f64 = 0.95;
/// Mean parameter similarity at which `parameter_match` is set.
pub const PARAMETER_MATCH_THRESHOLD: f64 = 0.9;

/// Comparison of the call at one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallComparison {
    pub index: usize,
    pub actual_name: String,
    pub expected_name: String,
    pub name_match: bool,
    pub parameter_exact_match: bool,
    pub parameter_similarity: f64,
    pub value_match: bool,
}

/// Aggregate comparison of an actual call sequence against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallMetrics {
    pub exact_match: bool,
    pub function_name_match: bool,
    pub parameter_match: bool,
    pub value_match: bool,
    pub call_count_match: bool,
    pub similarity_score: f64,
    pub function_name_accuracy: f64,
    pub parameter_accuracy: f64,
    pub value_accuracy: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub per_call: Vec<CallComparison>,
}

impl FunctionCallMetrics {
    /// Both sides empty.
    pub fn perfect() -> Self {
        Self {
            exact_match: true,
            function_name_match: true,
            parameter_match: true,
            value_match: true,
            call_count_match: true,
            similarity_score: 1.0,
            function_name_accuracy: 1.0,
            parameter_accuracy: 1.0,
            value_accuracy: 1.0,
            per_call: Vec::new(),
        }
    }

    /// Exactly one side empty, or the agent failed.
    pub fn zero() -> Self {
        Self {
            exact_match: false,
            function_name_match: false,
            parameter_match: false,
            value_match: false,
            call_count_match: false,
            similarity_score: 0.0,
            function_name_accuracy: 0.0,
            parameter_accuracy: 0.0,
            value_accuracy: 0.0,
            per_call: Vec::new(),
        }
    }
}

impl Default for FunctionCallMetrics {
    fn default() -> Self {
        Self::zero()
    }
}

pub fn compare_function_calls(
    actual: &[FunctionCall],
    expected: &[FunctionCall],
) -> FunctionCallMetrics {
    match (actual.is_empty(), expected.is_empty()) {
        (true, true) => return FunctionCallMetrics::perfect(),
        (true, false) | (false, true) => return FunctionCallMetrics::zero(),
        (false, false) => {}
    }

    let call_count_match = actual.len() == expected.len();

    let per_call: Vec<CallComparison> = actual
        .iter()
        .zip(expected)
        .enumerate()
        .map(|(index, (a, e))| {
            let params = compare_parameters(&a.parameters, &e.parameters);
            CallComparison {
                index,
                actual_name: a.name.clone(),
                expected_name: e.name.clone(),
                name_match: a.name.to_lowercase() == e.name.to_lowercase(),
                parameter_exact_match: params.exact_match,
                parameter_similarity: params.similarity,
                value_match: normalize(&a.attached_value) == normalize(&e.attached_value),
            }
        })
        .collect();

    let compared = per_call.len() as f64;
    let function_name_accuracy = per_call.iter().filter(|c| c.name_match).count() as f64 / compared;
    let parameter_accuracy = per_call.iter().map(|c| c.parameter_similarity).sum::<f64>() / compared;
    let value_accuracy = per_call.iter().filter(|c| c.value_match).count() as f64 / compared;

    let similarity_score = NAME_WEIGHT * function_name_accuracy
        + PARAMETER_WEIGHT * parameter_accuracy
        + VALUE_WEIGHT * value_accuracy;

    let exact_match = call_count_match
        && function_name_accuracy == 1.0
        && per_call
            .iter()
            .all(|c| c.parameter_similarity >= EXACT_PARAMETER_THRESHOLD)
        && value_accuracy == 1.0;

    FunctionCallMetrics {
        exact_match,
        function_name_match: function_name_accuracy == 1.0,
        parameter_match: parameter_accuracy >= PARAMETER_MATCH_THRESHOLD,
        value_match: value_accuracy == 1.0,
        call_count_match,
        similarity_score,
        function_name_accuracy,
        parameter_accuracy,
        value_accuracy,
        per_call,
    }
}
