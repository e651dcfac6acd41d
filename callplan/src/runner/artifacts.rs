//! Flat-file run artifacts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::eval::{generate_report, Evaluation, TestMetrics};
use crate::runner::TestRecord;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Paths of everything written for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFiles {
    pub results: String,
    pub metrics: String,
    pub evaluations: String,
    pub report: String,
    pub summary: String,
}

/// Headline figures written alongside the full artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub test_run_id: String,
    pub timestamp: String,
    pub model_name: String,
    pub total_tests: usize,
    pub successful_tests: usize,
    pub accuracy: f64,
    pub function_name_accuracy: f64,
    pub parameter_accuracy: f64,
    pub contract_selection_accuracy: f64,
    pub reasoning_quality_score: f64,
    pub files: ArtifactPaths,
}

/// Files the summary points at (the summary does not list itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub results: String,
    pub metrics: String,
    pub evaluations: String,
    pub report: String,
}

pub struct RunArtifacts<'a> {
    pub test_run_id: &'a str,
    pub timestamp: &'a str,
    pub model_name: &'a str,
    pub results: &'a [TestRecord],
    pub evaluations: &'a [Evaluation],
    pub metrics: &'a TestMetrics,
}

/// Write results, metrics, evaluations, report and summary into `dir`.
pub async fn save_artifacts(
    dir: &Path,
    artifacts: &RunArtifacts<'_>,
) -> Result<OutputFiles, ArtifactError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let run_id = artifacts.test_run_id;
    let results = write_json(dir, &format!("test_results_{run_id}.json"), "results", artifacts.results).await?;
    let metrics = write_json(dir, &format!("test_metrics_{run_id}.json"), "metrics", artifacts.metrics).await?;
    let evaluations = write_json(
        dir,
        &format!("test_evaluations_{run_id}.json"),
        "evaluations",
        artifacts.evaluations,
    )
    .await?;

    let report_text = generate_report(artifacts.metrics, artifacts.evaluations);
    let report = write_text(dir, &format!("test_report_{run_id}.txt"), &report_text).await?;

    let summary_doc = RunSummary {
        test_run_id: run_id.to_string(),
        timestamp: artifacts.timestamp.to_string(),
        model_name: artifacts.model_name.to_string(),
        total_tests: artifacts.metrics.total_tests,
        successful_tests: artifacts.metrics.successful_tests,
        accuracy: artifacts.metrics.accuracy,
        function_name_accuracy: artifacts.metrics.function_name_accuracy,
        parameter_accuracy: artifacts.metrics.parameter_accuracy,
        contract_selection_accuracy: artifacts.metrics.contract_selection_accuracy,
        reasoning_quality_score: artifacts.metrics.reasoning_quality_score,
        files: ArtifactPaths {
            results: results.clone(),
            metrics: metrics.clone(),
            evaluations: evaluations.clone(),
            report: report.clone(),
        },
    };
    let summary = write_json(dir, &format!("test_summary_{run_id}.json"), "summary", &summary_doc).await?;

    tracing::info!(dir = %dir.display(), run_id = %run_id, "Test results saved");
    Ok(OutputFiles {
        results,
        metrics,
        evaluations,
        report,
        summary,
    })
}

async fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    file_name: &str,
    what: &'static str,
    value: &T,
) -> Result<String, ArtifactError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|source| ArtifactError::Serialize { what, source })?;
    write_text(dir, file_name, &body).await
}

async fn write_text(dir: &Path, file_name: &str, body: &str) -> Result<String, ArtifactError> {
    let path = dir.join(file_name);
    tokio::fs::write(&path, body)
        .await
        .map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path.display().to_string())
}
