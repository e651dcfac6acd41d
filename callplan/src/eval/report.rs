//! Human-readable run report.

use std::fmt::Write as _;

use super::evaluator::Evaluation;
use super::metrics::TestMetrics;

const RULE_WIDTH: usize = 80;

fn pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// Render the full text report for a run.
pub fn generate_report(metrics: &TestMetrics, evaluations: &[Evaluation]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let total = metrics.total_tests;
    let mut out = String::new();

    // Writes into a String are infallible.
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "CALLPLAN AGENT TEST REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    let _ = writeln!(out, "SUMMARY METRICS:");
    let _ = writeln!(out, "  Total Tests: {}", metrics.total_tests);
    let _ = writeln!(out, "  Successful Tests: {}", metrics.successful_tests);
    let _ = writeln!(out, "  Failed Tests: {}", metrics.failed_tests);
    let _ = writeln!(out, "  Overall Accuracy: {}", pct(metrics.accuracy));
    let _ = writeln!(out);

    let _ = writeln!(out, "DETAILED METRICS:");
    let _ = writeln!(
        out,
        "  Query Rewriting Similarity: {}",
        pct(metrics.rewritten_query_similarity)
    );
    let _ = writeln!(
        out,
        "  Contract Selection Accuracy: {}",
        pct(metrics.contract_selection_accuracy)
    );
    let _ = writeln!(out, "  Function Name Accuracy: {}", pct(metrics.function_name_accuracy));
    let _ = writeln!(out, "  Parameter Accuracy: {}", pct(metrics.parameter_accuracy));
    let _ = writeln!(out, "  Value Accuracy: {}", pct(metrics.value_accuracy));
    let _ = writeln!(
        out,
        "  Reasoning Quality Score: {}",
        pct(metrics.reasoning_quality_score)
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "COMPONENT SUCCESS COUNTS:");
    let _ = writeln!(out, "  Function Name Matches: {}/{total}", metrics.function_name_matches);
    let _ = writeln!(out, "  Parameter Matches: {}/{total}", metrics.parameter_matches);
    let _ = writeln!(out, "  Value Matches: {}/{total}", metrics.value_matches);
    let _ = writeln!(out, "  Contract Matches: {}/{total}", metrics.contract_matches);
    let _ = writeln!(out);

    let failed: Vec<&Evaluation> = evaluations.iter().filter(|e| !e.overall_match).collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "FAILED TEST CASES:");
        for (i, eval) in failed.iter().enumerate() {
            let id = if eval.test_case_id.is_empty() {
                "unknown"
            } else {
                eval.test_case_id.as_str()
            };
            let _ = writeln!(out, "  {}. {id}", i + 1);
            let _ = writeln!(
                out,
                "     Error: {}",
                eval.error.as_deref().unwrap_or("No specific error")
            );
            let _ = writeln!(
                out,
                "     Query Similarity: {}",
                pct(eval.rewritten_query_similarity)
            );
            let _ = writeln!(out, "     Contract Match: {}", eval.contract_selection_match);
            let _ = writeln!(
                out,
                "     Function Match: {}",
                eval.function_call_metrics.exact_match
            );
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "PERFORMANCE RECOMMENDATIONS:");
    for line in recommendations(metrics) {
        let _ = writeln!(out, "  - {line}");
    }
    let _ = writeln!(out);
    let _ = write!(out, "{rule}");

    out
}

/// Threshold-driven advice lines, in report order.
pub fn recommendations(metrics: &TestMetrics) -> Vec<&'static str> {
    let mut lines = Vec::new();
    if metrics.accuracy < 0.8 {
        lines.push("Overall accuracy is below 80%. Consider improving query processing.");
    }
    if metrics.function_name_accuracy < 0.9 {
        lines.push("Function name accuracy needs improvement. Review function matching logic.");
    }
    if metrics.parameter_accuracy < 0.8 {
        lines.push("Parameter accuracy is low. Check parameter extraction and normalization.");
    }
    if metrics.contract_selection_accuracy < 0.9 {
        lines.push("Contract selection accuracy needs improvement. Review contract selection logic.");
    }
    if metrics.rewritten_query_similarity < 0.7 {
        lines.push("Query rewriting similarity is low. Improve query rewriting prompts.");
    }
    if metrics.accuracy >= 0.9 {
        lines.push("Excellent performance! Agent is working well.");
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_use_two_decimals() {
        assert_eq!(pct(0.5), "50.00%");
        assert_eq!(pct(1.0), "100.00%");
        assert_eq!(pct(0.12345), "12.35%");
    }

    #[test]
    fn test_recommendations_thresholds() {
        let poor = TestMetrics::default();
        assert_eq!(recommendations(&poor).len(), 5);

        let excellent = TestMetrics {
            accuracy: 0.95,
            function_name_accuracy: 1.0,
            parameter_accuracy: 1.0,
            contract_selection_accuracy: 1.0,
            rewritten_query_similarity: 0.9,
            ..TestMetrics::default()
        };
        assert_eq!(
            recommendations(&excellent),
            vec!["Excellent performance! Agent is working well."]
        );
    }

    #[test]
    fn test_all_passing_report_has_no_failed_block() {
        let report = generate_report(&TestMetrics::default(), &[]);
        assert!(report.starts_with(&"=".repeat(80)));
        assert!(report.contains("CALLPLAN AGENT TEST REPORT"));
        assert!(!report.contains("FAILED TEST CASES:"));
        assert!(report.contains("Function Name Matches: 0/0"));
    }
}
