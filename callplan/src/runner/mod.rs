//! Evaluation test runner
//!
//! Loads test cases, drives each one through a [`QueryAgent`] with a per-test
//! timeout and bounded retries, evaluates the results against ground truth,
//! aggregates metrics and persists the run artifacts.
//!
//! Sequential mode runs tests in file order with a short pause between them.
//! Parallel mode bounds in-flight tests with a semaphore; a high limit can
//! trip provider rate limits.

pub mod artifacts;
pub mod clock;
pub mod policy;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::{AgentResult, TestCase};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::agent::{QueryAgent, SharedQueryAgent};
use crate::eval::{aggregate, evaluate, Evaluation, TestMetrics};

pub use artifacts::{save_artifacts, ArtifactError, OutputFiles, RunArtifacts, RunSummary};
pub use clock::{Clock, SharedClock, TokioClock};
pub use policy::{AttemptOutcome, RetryPolicy, TestEvent, TestState};

pub const NO_RESULTS_ERROR: &str = "No test results obtained";
pub const TASK_FAILED_PREFIX: &str = "Test task failed: ";

#[derive(Debug, thiserror::Error)]
pub enum TestCaseError {
    #[error("failed to read test cases from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse test cases in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Execution settings shared by every test in a run.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub model_name: String,
    pub test_cases_file: PathBuf,
    pub output_dir: PathBuf,
    pub test_timeout: Duration,
    pub retry: RetryPolicy,
    /// Pause between consecutive tests in sequential mode.
    pub inter_test_delay: Duration,
    /// Maximum in-flight tests in parallel mode.
    pub parallel_limit: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            model_name: "o3-mini".to_string(),
            test_cases_file: PathBuf::from("tests/test_cases.json"),
            output_dir: PathBuf::from("tests/results"),
            test_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            inter_test_delay: Duration::from_millis(500),
            parallel_limit: 3,
        }
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Case-insensitive substring of the test id.
    pub test_filter: Option<String>,
    pub max_tests: Option<usize>,
    pub parallel: bool,
    pub save_results: bool,
}

/// Raw outcome of one test after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_case_id: String,
    pub test_index: usize,
    #[serde(flatten)]
    pub result: AgentResult,
    pub execution_time_secs: f64,
    pub retry_count: u32,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub test_run_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TestMetrics>,
    pub test_results: Vec<TestRecord>,
    pub evaluations: Vec<Evaluation>,
    pub model_name: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_files: Option<OutputFiles>,
}

/// Read a JSON array of test cases. Cases without an id get `test_<index>`.
pub async fn load_test_cases(path: &Path) -> Result<Vec<TestCase>, TestCaseError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TestCaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut cases: Vec<TestCase> =
        serde_json::from_str(&content).map_err(|source| TestCaseError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    for (index, case) in cases.iter_mut().enumerate() {
        if case.id.trim().is_empty() {
            case.id = format!("test_{index}");
        }
    }
    tracing::info!(path = %path.display(), count = cases.len(), "Loaded test cases");
    Ok(cases)
}

/// Apply the id filter, then truncate.
pub fn select_cases(
    cases: Vec<TestCase>,
    test_filter: Option<&str>,
    max_tests: Option<usize>,
) -> Vec<TestCase> {
    let mut selected: Vec<TestCase> = match test_filter.filter(|f| !f.is_empty()) {
        Some(filter) => {
            let needle = filter.to_lowercase();
            let filtered: Vec<TestCase> = cases
                .into_iter()
                .filter(|case| case.id.to_lowercase().contains(&needle))
                .collect();
            tracing::info!(filter = %filter, count = filtered.len(), "Filtered test cases");
            filtered
        }
        None => cases,
    };
    if let Some(max) = max_tests.filter(|max| *max > 0) {
        selected.truncate(max);
    }
    selected
}

/// Build the run id: unix seconds plus a file-name-safe model name.
pub fn make_run_id(unix_secs: i64, model_name: &str) -> String {
    let model: String = model_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{unix_secs}_{model}")
}

pub struct TestRunner {
    agent: SharedQueryAgent,
    clock: SharedClock,
    settings: RunnerSettings,
}

impl TestRunner {
    pub fn new(agent: SharedQueryAgent, settings: RunnerSettings) -> Self {
        Self {
            agent,
            clock: Arc::new(TokioClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Load cases from the configured file and run them.
    pub async fn run(&self, options: &RunOptions) -> RunOutcome {
        match load_test_cases(&self.settings.test_cases_file).await {
            Ok(cases) => self.run_cases(cases, options).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load test cases");
                self.failed_outcome(format!("{NO_RESULTS_ERROR}: {e}"))
            }
        }
    }

    /// Run an in-memory case list. Never fails; problems are reported in the
    /// outcome.
    pub async fn run_cases(&self, cases: Vec<TestCase>, options: &RunOptions) -> RunOutcome {
        let cases = select_cases(cases, options.test_filter.as_deref(), options.max_tests);
        let test_run_id = make_run_id(chrono::Utc::now().timestamp(), &self.settings.model_name);
        tracing::info!(run_id = %test_run_id, tests = cases.len(), "Starting test run");

        if cases.is_empty() {
            tracing::error!("No test cases to run after filtering");
            return self.failed_outcome_with_id(test_run_id, NO_RESULTS_ERROR.to_string());
        }

        let started = self.clock.now();
        let results = if options.parallel {
            self.run_parallel(&cases).await
        } else {
            self.run_sequential(&cases).await
        };
        tracing::info!(
            elapsed_ms = self.clock.now().duration_since(started).as_millis() as u64,
            "All tests completed"
        );

        if results.is_empty() {
            tracing::error!("{NO_RESULTS_ERROR}");
            return self.failed_outcome_with_id(test_run_id, NO_RESULTS_ERROR.to_string());
        }

        let evaluations = evaluate_records(&results, &cases);
        let metrics = aggregate(&evaluations);
        tracing::info!(accuracy = metrics.accuracy, "Evaluation complete");

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let output_files = if options.save_results {
            let artifacts = RunArtifacts {
                test_run_id: &test_run_id,
                timestamp: &timestamp,
                model_name: &self.settings.model_name,
                results: &results,
                evaluations: &evaluations,
                metrics: &metrics,
            };
            match save_artifacts(&self.settings.output_dir, &artifacts).await {
                Ok(files) => Some(files),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to save test artifacts");
                    None
                }
            }
        } else {
            None
        };

        RunOutcome {
            test_run_id,
            success: true,
            error: None,
            metrics: Some(metrics),
            test_results: results,
            evaluations,
            model_name: self.settings.model_name.clone(),
            timestamp,
            output_files,
        }
    }

    async fn run_sequential(&self, cases: &[TestCase]) -> Vec<TestRecord> {
        let mut results = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let record = execute_isolated(
                Arc::clone(&self.agent),
                Arc::clone(&self.clock),
                self.settings.clone(),
                case.clone(),
                index,
            )
            .await;
            results.push(record);
            if index + 1 < cases.len() {
                self.clock.sleep(self.settings.inter_test_delay).await;
            }
        }
        results
    }

    async fn run_parallel(&self, cases: &[TestCase]) -> Vec<TestRecord> {
        let limit = self.settings.parallel_limit.max(1);
        tracing::warn!(limit, "Running tests in parallel; watch for API rate limits");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut join_set = JoinSet::new();

        for (index, case) in cases.iter().cloned().enumerate() {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::error!("Concurrency limiter closed; stopping dispatch");
                break;
            };
            let agent = Arc::clone(&self.agent);
            let clock = Arc::clone(&self.clock);
            let settings = self.settings.clone();

            join_set.spawn(async move {
                let _permit = permit;
                execute_isolated(agent, clock, settings, case, index).await
            });
        }

        // Completion order is arbitrary; slot by index so duplicate ids survive.
        let mut slots: Vec<Option<TestRecord>> = vec![None; cases.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(record) => {
                    let index = record.test_index;
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(record);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Test task failed to complete"),
            }
        }
        slots.into_iter().flatten().collect()
    }

    fn failed_outcome(&self, error: String) -> RunOutcome {
        let id = make_run_id(chrono::Utc::now().timestamp(), &self.settings.model_name);
        self.failed_outcome_with_id(id, error)
    }

    fn failed_outcome_with_id(&self, test_run_id: String, error: String) -> RunOutcome {
        RunOutcome {
            test_run_id,
            success: false,
            error: Some(error),
            metrics: None,
            test_results: Vec::new(),
            evaluations: Vec::new(),
            model_name: self.settings.model_name.clone(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            output_files: None,
        }
    }
}

/// Run one case on its own task so a panicking agent fails only that test.
async fn execute_isolated(
    agent: SharedQueryAgent,
    clock: SharedClock,
    settings: RunnerSettings,
    case: TestCase,
    index: usize,
) -> TestRecord {
    let test_case_id = case.id.clone();
    let handle = tokio::spawn(async move {
        execute_case(agent.as_ref(), clock.as_ref(), &settings, &case, index).await
    });
    match handle.await {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(test_id = %test_case_id, error = %e, "Test task aborted");
            TestRecord {
                test_case_id,
                test_index: index,
                result: AgentResult::failure(format!("{TASK_FAILED_PREFIX}{e}")),
                execution_time_secs: 0.0,
                retry_count: 0,
            }
        }
    }
}

/// Drive one case through the retry state machine.
pub async fn execute_case(
    agent: &dyn QueryAgent,
    clock: &dyn Clock,
    settings: &RunnerSettings,
    case: &TestCase,
    index: usize,
) -> TestRecord {
    let policy = settings.retry;
    let mut state = policy.transition(TestState::Pending, TestEvent::Start);
    let mut last: Option<(AttemptOutcome, f64, u32)> = None;

    tracing::info!(test_id = %case.id, index = index + 1, "Running test");

    loop {
        match state {
            TestState::Running { attempt } => {
                let started = clock.now();
                let outcome = run_attempt(agent, &case.query, settings.test_timeout).await;
                let elapsed = clock.now().duration_since(started).as_secs_f64();

                match &outcome {
                    AttemptOutcome::Success(_) => {}
                    AttemptOutcome::Timeout(limit) => tracing::error!(
                        test_id = %case.id,
                        attempt,
                        timeout_secs = limit.as_secs_f64(),
                        "Test timed out"
                    ),
                    AttemptOutcome::Error(e) => tracing::error!(
                        test_id = %case.id,
                        attempt,
                        error = %e,
                        "Test failed with error"
                    ),
                    AttemptOutcome::Unsuccessful(result) => tracing::warn!(
                        test_id = %case.id,
                        attempt,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "Agent reported failure"
                    ),
                }

                state = policy.transition(
                    state,
                    TestEvent::AttemptFinished {
                        success: outcome.is_success(),
                    },
                );
                last = Some((outcome, elapsed, attempt));
            }
            TestState::Retry { attempt } => {
                tracing::info!(
                    test_id = %case.id,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts(),
                    "Retrying test"
                );
                clock.sleep(policy.retry_delay).await;
                state = policy.transition(state, TestEvent::DelayElapsed);
            }
            TestState::Pending | TestState::Complete { .. } | TestState::Failed { .. } => break,
        }
    }

    let (result, execution_time_secs, retry_count) = match last {
        Some((outcome, elapsed, attempt)) => (outcome.into_result(), elapsed, attempt),
        None => (AgentResult::failure("Test was never attempted"), 0.0, 0),
    };

    if result.success {
        tracing::info!(
            test_id = %case.id,
            elapsed_secs = execution_time_secs,
            retry_count,
            "Test completed"
        );
    }

    TestRecord {
        test_case_id: case.id.clone(),
        test_index: index,
        result,
        execution_time_secs,
        retry_count,
    }
}

async fn run_attempt(agent: &dyn QueryAgent, query: &str, timeout: Duration) -> AttemptOutcome {
    match tokio::time::timeout(timeout, agent.process_query(query)).await {
        Err(_) => AttemptOutcome::Timeout(timeout),
        Ok(Err(e)) => AttemptOutcome::Error(e),
        Ok(Ok(result)) if result.success => AttemptOutcome::Success(result),
        Ok(Ok(result)) => AttemptOutcome::Unsuccessful(result),
    }
}

/// Evaluate each record against its case: the case at the record's index when
/// the ids agree, otherwise the case with that id. Records without a case are
/// skipped.
pub fn evaluate_records(results: &[TestRecord], cases: &[TestCase]) -> Vec<Evaluation> {
    let by_id: HashMap<&str, &TestCase> = cases.iter().map(|c| (c.id.as_str(), c)).collect();
    results
        .iter()
        .filter_map(|record| {
            let at_index = cases
                .get(record.test_index)
                .filter(|case| case.id == record.test_case_id);
            let Some(case) = at_index.or_else(|| by_id.get(record.test_case_id.as_str()).copied())
            else {
                tracing::warn!(test_id = %record.test_case_id, "No test case found for result");
                return None;
            };
            let mut evaluation = evaluate(&record.result, case);
            evaluation.execution_time_secs = record.execution_time_secs;
            evaluation.retry_count = record.retry_count;
            Some(evaluation)
        })
        .collect()
}

/// Console summary of a run's metrics.
pub fn format_summary(metrics: &TestMetrics) -> String {
    let rule = "=".repeat(60);
    let pct = |v: f64| format!("{:.1}%", v * 100.0);
    [
        String::new(),
        rule.clone(),
        "CALLPLAN AGENT TEST SUMMARY".to_string(),
        rule.clone(),
        format!("Total Tests: {}", metrics.total_tests),
        format!("Successful: {}", metrics.successful_tests),
        format!("Failed: {}", metrics.failed_tests),
        format!("Overall Accuracy: {}", pct(metrics.accuracy)),
        format!("Function Name Accuracy: {}", pct(metrics.function_name_accuracy)),
        format!("Parameter Accuracy: {}", pct(metrics.parameter_accuracy)),
        format!(
            "Contract Selection Accuracy: {}",
            pct(metrics.contract_selection_accuracy)
        ),
        format!("Reasoning Quality: {}", pct(metrics.reasoning_quality_score)),
        rule,
    ]
    .join("\n")
}

pub fn print_summary(metrics: &TestMetrics) {
    println!("{}", format_summary(metrics));
}
