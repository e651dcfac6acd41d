//! Test runner tests: retries, timeouts, parallel dispatch, filtering and
//! artifact persistence against scripted agents and a recording clock.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use shared_types::{AgentResult, FunctionCall, FunctionCallPlan, TestCase};

use callplan::agent::QueryAgent;
use callplan::runner::{
    execute_case, load_test_cases, Clock, RetryPolicy, RunOptions, RunSummary, RunnerSettings,
    TestCaseError, TestRunner, NO_RESULTS_ERROR, TASK_FAILED_PREFIX,
};
use callplan::AgentError;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Clone)]
enum Step {
    Succeed,
    Unsuccessful(&'static str),
    Fail(AgentError),
    Hang(Duration),
}

/// Agent that replays a per-query script; the last step repeats.
#[derive(Default)]
struct ScriptedAgent {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn with(scripts: &[(&str, Vec<Step>)]) -> Arc<Self> {
        let agent = Self::default();
        {
            let mut map = agent.scripts.lock().unwrap();
            for (query, steps) in scripts {
                map.insert(query.to_string(), steps.iter().cloned().collect());
            }
        }
        Arc::new(agent)
    }

    fn next_step(&self, query: &str) -> Step {
        let mut map = self.scripts.lock().unwrap();
        let script = map.get_mut(query).expect("scripted query");
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl QueryAgent for ScriptedAgent {
    async fn process_query(&self, query: &str) -> Result<AgentResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step(query) {
            Step::Succeed => Ok(success_for(query)),
            Step::Unsuccessful(error) => Ok(AgentResult::failure(error)),
            Step::Fail(e) => Err(e),
            Step::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(success_for(query))
            }
        }
    }
}

fn success_for(query: &str) -> AgentResult {
    AgentResult {
        success: true,
        original_query: Some(query.to_string()),
        rewritten_query: Some(query.to_string()),
        selected_contract_address: Some("0xSafe".to_string()),
        selected_contracts: vec!["0xSafe".to_string()],
        produced_calls: Some(vec![FunctionCall::new("changeThreshold").with_param("_threshold", "2")]),
        ..AgentResult::default()
    }
}

/// Agent that sleeps per query and tracks peak concurrency.
#[derive(Default)]
struct SlowAgent {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl QueryAgent for SlowAgent {
    async fn process_query(&self, query: &str) -> Result<AgentResult, AgentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let millis: u64 = query.rsplit(' ').next().and_then(|ms| ms.parse().ok()).unwrap_or(5);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(success_for(query))
    }
}

/// Agent that panics on one query and succeeds on the rest.
struct PanickingAgent {
    poison: &'static str,
}

#[async_trait]
impl QueryAgent for PanickingAgent {
    async fn process_query(&self, query: &str) -> Result<AgentResult, AgentError> {
        if query == self.poison {
            panic!("agent crashed on {query}");
        }
        Ok(success_for(query))
    }
}

/// Clock that records requested sleeps without waiting.
#[derive(Default)]
struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

fn case(id: &str, query: &str) -> TestCase {
    TestCase {
        id: id.to_string(),
        query: query.to_string(),
        expected_rewritten_query: query.to_string(),
        expected_contract_address: "0xSafe".to_string(),
        ground_truth: FunctionCallPlan {
            function_calling: vec![FunctionCall::new("changeThreshold").with_param("_threshold", "2")],
        },
        ..TestCase::default()
    }
}

fn settings(output_dir: &Path) -> RunnerSettings {
    RunnerSettings {
        model_name: "test-model".to_string(),
        test_cases_file: output_dir.join("test_cases.json"),
        output_dir: output_dir.to_path_buf(),
        test_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
        },
        inter_test_delay: Duration::from_millis(500),
        parallel_limit: 3,
    }
}

// ============================================================================
// Single test execution
// ============================================================================

#[tokio::test]
async fn test_retry_then_success() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[(
        "raise threshold",
        vec![Step::Unsuccessful("model overloaded"), Step::Succeed],
    )]);
    let clock = RecordingClock::default();

    let record = execute_case(
        agent.as_ref(),
        &clock,
        &settings(dir.path()),
        &case("TC_1", "raise threshold"),
        0,
    )
    .await;

    assert!(record.result.success);
    assert_eq!(record.retry_count, 1);
    assert_eq!(record.test_case_id, "TC_1");
    assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*clock.sleeps.lock().unwrap(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_retries_exhausted_keeps_last_error() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[(
        "raise threshold",
        vec![Step::Fail(AgentError::Transport("connection refused".to_string()))],
    )]);
    let clock = RecordingClock::default();

    let record = execute_case(
        agent.as_ref(),
        &clock,
        &settings(dir.path()),
        &case("TC_1", "raise threshold"),
        4,
    )
    .await;

    assert!(!record.result.success);
    assert_eq!(record.retry_count, 2);
    assert_eq!(record.test_index, 4);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        record.result.error.as_deref(),
        Some("Test failed with error: transport error: connection refused")
    );
    assert_eq!(clock.sleeps.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unsuccessful_result_is_returned_after_retries() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[("q", vec![Step::Unsuccessful("No relevant contracts")])]);
    let mut settings = settings(dir.path());
    settings.retry.max_retries = 0;

    let record = execute_case(
        agent.as_ref(),
        &RecordingClock::default(),
        &settings,
        &case("TC", "q"),
        0,
    )
    .await;
    assert_eq!(record.retry_count, 0);
    assert_eq!(record.result.error.as_deref(), Some("No relevant contracts"));
}

#[tokio::test]
async fn test_hanging_agent_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[("slow", vec![Step::Hang(Duration::from_secs(5))])]);
    let mut settings = settings(dir.path());
    settings.test_timeout = Duration::from_millis(50);
    settings.retry.max_retries = 1;

    let started = Instant::now();
    let record = execute_case(
        agent.as_ref(),
        &RecordingClock::default(),
        &settings,
        &case("TC_SLOW", "slow"),
        0,
    )
    .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!record.result.success);
    assert_eq!(record.retry_count, 1);
    let error = record.result.error.unwrap();
    assert!(error.starts_with("Test timed out after"), "{error}");
    assert!(record.execution_time_secs < 1.0);
}

// ============================================================================
// Whole runs
// ============================================================================

#[tokio::test]
async fn test_sequential_run_pauses_between_tests() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[("a", vec![Step::Succeed]), ("b", vec![Step::Succeed])]);
    let clock = Arc::new(RecordingClock::default());
    let runner = TestRunner::new(agent, settings(dir.path())).with_clock(clock.clone());

    let outcome = runner
        .run_cases(vec![case("A", "a"), case("B", "b"), case("C", "a")], &RunOptions::default())
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.test_results.len(), 3);
    assert_eq!(
        *clock.sleeps.lock().unwrap(),
        vec![Duration::from_millis(500); 2]
    );
    let metrics = outcome.metrics.unwrap();
    assert_eq!(metrics.total_tests, 3);
    assert_eq!(metrics.accuracy, 1.0);
    assert!(outcome.output_files.is_none());
}

#[tokio::test]
async fn test_parallel_run_keeps_case_order_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Arc::new(SlowAgent::default());
    let mut settings = settings(dir.path());
    settings.parallel_limit = 2;
    let runner = TestRunner::new(agent.clone(), settings);

    let cases = vec![
        case("P1", "sleep 60"),
        case("P2", "sleep 5"),
        case("P3", "sleep 30"),
        case("P4", "sleep 1"),
        case("P5", "sleep 10"),
    ];
    let options = RunOptions {
        parallel: true,
        ..RunOptions::default()
    };
    let outcome = runner.run_cases(cases, &options).await;

    let ids: Vec<&str> = outcome
        .test_results
        .iter()
        .map(|r| r.test_case_id.as_str())
        .collect();
    assert_eq!(ids, vec!["P1", "P2", "P3", "P4", "P5"]);
    let eval_ids: Vec<&str> = outcome
        .evaluations
        .iter()
        .map(|e| e.test_case_id.as_str())
        .collect();
    assert_eq!(eval_ids, ids);
    assert!(agent.peak.load(Ordering::SeqCst) <= 2);
    assert!(agent.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_filter_and_limit_apply_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[("q", vec![Step::Succeed])]);
    let runner = TestRunner::new(agent.clone(), settings(dir.path()))
        .with_clock(Arc::new(RecordingClock::default()));

    let cases = vec![
        case("ZRC_1", "q"),
        case("SAFE_1", "q"),
        case("zrc_2", "q"),
        case("ZRC_3", "q"),
    ];
    let options = RunOptions {
        test_filter: Some("zrc".to_string()),
        max_tests: Some(2),
        ..RunOptions::default()
    };
    let outcome = runner.run_cases(cases, &options).await;

    let ids: Vec<&str> = outcome
        .test_results
        .iter()
        .map(|r| r.test_case_id.as_str())
        .collect();
    assert_eq!(ids, vec!["ZRC_1", "zrc_2"]);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_selection_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[("q", vec![Step::Succeed])]);
    let runner = TestRunner::new(agent.clone(), settings(dir.path()));

    let options = RunOptions {
        test_filter: Some("nothing-matches".to_string()),
        ..RunOptions::default()
    };
    let outcome = runner.run_cases(vec![case("A", "q")], &options).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some(NO_RESULTS_ERROR));
    assert!(outcome.metrics.is_none());
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_test_case_file_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(ScriptedAgent::with(&[]), settings(dir.path()));

    let outcome = runner.run(&RunOptions::default()).await;
    assert!(!outcome.success);
    let error = outcome.error.unwrap();
    assert!(error.starts_with(NO_RESULTS_ERROR), "{error}");
    assert!(outcome.test_run_id.ends_with("_test-model"));
}

#[tokio::test]
async fn test_run_from_file_saves_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let cases = serde_json::json!([
        {
            "natural_language_query": "q",
            "expected_rewritten_query": "q",
            "assumed_contract_address": "0xSafe",
            "ground_truth_function_calls": {
                "function_calling": [
                    { "function_name": "changeThreshold", "parameters": { "_threshold": "2" } }
                ]
            }
        },
        {
            "test_case_id": "BROKEN",
            "natural_language_query": "broken"
        }
    ]);
    std::fs::write(
        dir.path().join("test_cases.json"),
        serde_json::to_string(&cases).unwrap(),
    )
    .unwrap();

    let agent = ScriptedAgent::with(&[
        ("q", vec![Step::Succeed]),
        ("broken", vec![Step::Unsuccessful("No relevant contracts found for the query")]),
    ]);
    let mut settings = settings(dir.path());
    settings.output_dir = dir.path().join("results");
    let runner = TestRunner::new(agent, settings).with_clock(Arc::new(RecordingClock::default()));

    let options = RunOptions {
        save_results: true,
        ..RunOptions::default()
    };
    let outcome = runner.run(&options).await;

    assert!(outcome.success);
    assert_eq!(outcome.test_results[0].test_case_id, "test_0");
    assert_eq!(outcome.test_results[1].retry_count, 2);
    let metrics = outcome.metrics.as_ref().unwrap();
    assert_eq!(metrics.total_tests, 2);
    assert_eq!(metrics.successful_tests, 1);

    let files = outcome.output_files.expect("artifacts written");
    for path in [
        &files.results,
        &files.metrics,
        &files.evaluations,
        &files.report,
        &files.summary,
    ] {
        assert!(Path::new(path).is_file(), "{path}");
        assert!(path.contains(&outcome.test_run_id));
    }

    let summary: RunSummary =
        serde_json::from_str(&std::fs::read_to_string(&files.summary).unwrap()).unwrap();
    assert_eq!(summary.model_name, "test-model");
    assert_eq!(summary.total_tests, 2);
    assert_eq!(summary.accuracy, 0.5);
    assert_eq!(summary.files.report, files.report);

    let report = std::fs::read_to_string(&files.report).unwrap();
    assert!(report.contains("CALLPLAN AGENT TEST REPORT"));
    assert!(report.contains("1. BROKEN"));
    assert!(report.contains("No relevant contracts found for the query"));

    let results: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files.results).unwrap()).unwrap();
    assert_eq!(results[1]["error"], "No relevant contracts found for the query");
    assert_eq!(results[0]["test_case_id"], "test_0");
}

#[tokio::test]
async fn test_duplicate_ids_keep_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let agent = ScriptedAgent::with(&[("first", vec![Step::Succeed]), ("second", vec![Step::Succeed])]);

    for parallel in [false, true] {
        let runner = TestRunner::new(agent.clone(), settings(dir.path()))
            .with_clock(Arc::new(RecordingClock::default()));
        let options = RunOptions {
            parallel,
            ..RunOptions::default()
        };
        let outcome = runner
            .run_cases(vec![case("DUP", "first"), case("DUP", "second")], &options)
            .await;

        let queries: Vec<Option<&str>> = outcome
            .test_results
            .iter()
            .map(|r| r.result.original_query.as_deref())
            .collect();
        assert_eq!(queries, vec![Some("first"), Some("second")], "parallel={parallel}");
        // Each record is scored against its own case.
        assert_eq!(outcome.evaluations.len(), 2);
        assert!(outcome.evaluations.iter().all(|e| e.overall_match), "parallel={parallel}");
    }
}

#[tokio::test]
async fn test_panicking_agent_fails_only_its_test() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Arc::new(PanickingAgent { poison: "boom" });

    for parallel in [false, true] {
        let runner = TestRunner::new(agent.clone(), settings(dir.path()))
            .with_clock(Arc::new(RecordingClock::default()));
        let options = RunOptions {
            parallel,
            ..RunOptions::default()
        };
        let outcome = runner
            .run_cases(
                vec![case("OK_1", "fine"), case("CRASH", "boom"), case("OK_2", "fine")],
                &options,
            )
            .await;

        assert!(outcome.success);
        let ids: Vec<&str> = outcome
            .test_results
            .iter()
            .map(|r| r.test_case_id.as_str())
            .collect();
        assert_eq!(ids, vec!["OK_1", "CRASH", "OK_2"], "parallel={parallel}");

        let crashed = &outcome.test_results[1];
        assert_eq!(crashed.test_index, 1);
        assert!(!crashed.result.success);
        let error = crashed.result.error.as_deref().unwrap();
        assert!(error.starts_with(TASK_FAILED_PREFIX), "{error}");

        let metrics = outcome.metrics.unwrap();
        assert_eq!(metrics.total_tests, 3);
        assert_eq!(metrics.successful_tests, 2);
    }
}

#[tokio::test]
async fn test_load_test_cases_reports_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cases.json");
    std::fs::write(&path, "[{\"test_case_id\": ").unwrap();
    assert!(matches!(
        load_test_cases(&path).await,
        Err(TestCaseError::Parse { .. })
    ));
    assert!(matches!(
        load_test_cases(&dir.path().join("absent.json")).await,
        Err(TestCaseError::Io { .. })
    ));

    std::fs::write(&path, r#"[{"natural_language_query": "q"}, {"test_case_id": "named"}]"#).unwrap();
    let cases = load_test_cases(&path).await.unwrap();
    let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["test_0", "named"]);
}
