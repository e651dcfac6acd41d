//! Single test-case verdicts.

use serde::{Deserialize, Serialize};
use shared_types::{AgentResult, TestCase};

use super::calls::{compare_function_calls, FunctionCallMetrics};
use super::similarity::string_similarity;

/// Rewritten-query similarity required for an overall match.
pub const QUERY_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Verdict for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub test_case_id: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub overall_match: bool,
    pub function_calls_match: bool,
    pub rewritten_query_similarity: f64,
    pub contract_selection_match: bool,
    pub function_call_metrics: FunctionCallMetrics,
    /// Wall-clock time of the final attempt, filled in by the runner.
    #[serde(default)]
    pub execution_time_secs: f64,
    #[serde(default)]
    pub retry_count: u32,
}

impl Evaluation {
    fn failed(test_case_id: String, error: Option<String>) -> Self {
        Self {
            test_case_id,
            success: false,
            error,
            overall_match: false,
            function_calls_match: false,
            rewritten_query_similarity: 0.0,
            contract_selection_match: false,
            function_call_metrics: FunctionCallMetrics::zero(),
            execution_time_secs: 0.0,
            retry_count: 0,
        }
    }
}

/// Score one agent result against its ground truth.
pub fn evaluate(actual: &AgentResult, expected: &TestCase) -> Evaluation {
    if !actual.success {
        return Evaluation::failed(expected.id.clone(), actual.error.clone());
    }

    let rewritten_query_similarity = string_similarity(
        actual.rewritten_query.as_deref().unwrap_or_default(),
        &expected.expected_rewritten_query,
    );

    let contract_selection_match = contracts_match(
        actual.selected_contract_address.as_deref(),
        &expected.expected_contract_address,
    );

    let function_call_metrics =
        compare_function_calls(actual.produced_calls(), expected.ground_truth_calls());

    let overall_match = rewritten_query_similarity >= QUERY_SIMILARITY_THRESHOLD
        && contract_selection_match
        && function_call_metrics.exact_match;

    Evaluation {
        test_case_id: expected.id.clone(),
        success: true,
        error: actual.error.clone(),
        overall_match,
        function_calls_match: function_call_metrics.exact_match,
        rewritten_query_similarity,
        contract_selection_match,
        function_call_metrics,
        execution_time_secs: 0.0,
        retry_count: 0,
    }
}

fn contracts_match(selected: Option<&str>, expected: &str) -> bool {
    match selected {
        Some(selected) if !selected.is_empty() && !expected.is_empty() => {
            selected.to_lowercase() == expected.to_lowercase()
        }
        _ => false,
    }
}
