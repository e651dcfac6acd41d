//! Aggregate statistics over a batch of evaluations.

use serde::{Deserialize, Serialize};

use super::evaluator::Evaluation;

/// Aggregate run metrics. Ratios are in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMetrics {
    pub total_tests: usize,
    pub successful_tests: usize,
    pub failed_tests: usize,
    pub accuracy: f64,
    pub function_name_accuracy: f64,
    pub parameter_accuracy: f64,
    pub value_accuracy: f64,
    pub rewritten_query_similarity: f64,
    pub contract_selection_accuracy: f64,
    pub function_name_matches: usize,
    pub parameter_matches: usize,
    pub value_matches: usize,
    pub contract_matches: usize,
    pub reasoning_quality_score: f64,
}

pub fn aggregate(evaluations: &[Evaluation]) -> TestMetrics {
    let total_tests = evaluations.len();
    if total_tests == 0 {
        return TestMetrics::default();
    }
    let total = total_tests as f64;
    let mean = |f: fn(&Evaluation) -> f64| evaluations.iter().map(f).sum::<f64>() / total;
    let count = |f: fn(&Evaluation) -> bool| evaluations.iter().filter(|e| f(e)).count();

    let successful_tests = count(|e| e.overall_match);
    let contract_matches = count(|e| e.contract_selection_match);

    let rewritten_query_similarity = mean(|e| e.rewritten_query_similarity);
    let function_name_accuracy = mean(|e| e.function_call_metrics.function_name_accuracy);
    let parameter_accuracy = mean(|e| e.function_call_metrics.parameter_accuracy);
    let value_accuracy = mean(|e| e.function_call_metrics.value_accuracy);

    TestMetrics {
        total_tests,
        successful_tests,
        failed_tests: total_tests - successful_tests,
        accuracy: successful_tests as f64 / total,
        function_name_accuracy,
        parameter_accuracy,
        value_accuracy,
        rewritten_query_similarity,
        contract_selection_accuracy: contract_matches as f64 / total,
        function_name_matches: count(|e| e.function_call_metrics.function_name_match),
        parameter_matches: count(|e| e.function_call_metrics.parameter_match),
        value_matches: count(|e| e.function_call_metrics.value_match),
        contract_matches,
        reasoning_quality_score: (rewritten_query_similarity
            + function_name_accuracy
            + parameter_accuracy)
            / 3.0,
    }
}
