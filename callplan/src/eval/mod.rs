//! Evaluation engine
//!
//! Pure scoring of agent output against ground truth:
//! value normalization → parameter comparison → call-sequence comparison →
//! per-test verdict → batch metrics → text report.

pub mod calls;
pub mod evaluator;
pub mod metrics;
pub mod normalize;
pub mod params;
pub mod report;
pub mod similarity;

pub use calls::{compare_function_calls, CallComparison, FunctionCallMetrics};
pub use evaluator::{evaluate, Evaluation, QUERY_SIMILARITY_THRESHOLD};
pub use metrics::{aggregate, TestMetrics};
pub use normalize::normalize;
pub use params::{compare_parameters, ParameterComparison};
pub use report::generate_report;
pub use similarity::string_similarity;
