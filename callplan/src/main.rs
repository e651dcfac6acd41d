//! callplan-eval: run the test-case suite against the contract-call agent.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use callplan::agent::{ContractAgent, HttpAgentGateway};
use callplan::config::RunnerConfig;
use callplan::runner::{print_summary, RunOptions, TestRunner};
use callplan::selection::{CandidateCache, ContractSelector};

#[derive(Parser, Debug)]
#[command(name = "callplan-eval")]
#[command(about = "Contract-call agent test runner", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to test cases JSON file
    #[arg(long)]
    test_cases: Option<PathBuf>,

    /// Model identifier passed to the agent service
    #[arg(long)]
    model: Option<String>,

    /// Directory containing enhanced ABIs
    #[arg(long)]
    enhanced_abis_dir: Option<PathBuf>,

    /// Directory to save test results
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Base URL of the agent service
    #[arg(long)]
    agent_url: Option<String>,

    /// Filter test cases by ID substring (case-insensitive)
    #[arg(long)]
    filter: Option<String>,

    /// Maximum number of tests to run
    #[arg(long)]
    max_tests: Option<usize>,

    /// Run tests in parallel (watch provider rate limits)
    #[arg(long)]
    parallel: bool,

    /// Do not save results to files
    #[arg(long)]
    no_save: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "callplan=debug,callplan_eval=debug"
    } else {
        "callplan=info,callplan_eval=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load `.env` from the current directory or the nearest ancestor that has one.
fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.is_file() {
            match dotenvy::from_path(&candidate) {
                Ok(()) => tracing::info!(path = %candidate.display(), "Loaded environment from .env"),
                Err(e) => tracing::warn!(
                    path = %candidate.display(),
                    error = %e,
                    "Failed to load .env file"
                ),
            }
            return;
        }
        if !current.pop() {
            break;
        }
    }

    tracing::debug!(cwd = %cwd.display(), "No .env file found; using process environment only");
}

fn apply_cli(config: &mut RunnerConfig, cli: &Cli) {
    if let Some(path) = &cli.test_cases {
        config.test_cases_file = path.clone();
    }
    if let Some(model) = &cli.model {
        config.model_name = model.clone();
    }
    if let Some(dir) = &cli.enhanced_abis_dir {
        config.enhanced_abis_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(url) = &cli.agent_url {
        config.agent_base_url = url.clone();
    }
    if cli.no_save {
        config.save_results = false;
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = RunnerConfig::load().context("invalid runner configuration")?;
    apply_cli(&mut config, &cli);
    let settings = config.runner_settings()?;

    tracing::info!(
        model = %config.model_name,
        test_cases = %config.test_cases_file.display(),
        agent_url = %config.agent_base_url,
        "Test runner initialized"
    );

    let gateway = Arc::new(
        HttpAgentGateway::new(
            config.agent_base_url.clone(),
            config.model_name.clone(),
            settings.test_timeout + Duration::from_secs(5),
        )
        .context("failed to build agent HTTP client")?,
    );
    let cache = Arc::new(CandidateCache::from_dir(config.enhanced_abis_dir.clone()));
    let agent = ContractAgent::new(
        cache,
        ContractSelector::new(gateway.clone()),
        gateway.clone(),
        gateway,
    )
    .with_max_contracts(config.max_contracts);

    let runner = TestRunner::new(Arc::new(agent), settings);
    let options = RunOptions {
        test_filter: cli.filter.clone(),
        max_tests: cli.max_tests,
        parallel: cli.parallel,
        save_results: config.save_results,
    };

    let outcome = runner.run(&options).await;
    if let Some(metrics) = &outcome.metrics {
        print_summary(metrics);
    }

    if outcome.success {
        println!("\nTest run completed successfully!");
        if let Some(files) = &outcome.output_files {
            println!("Results saved to: {}", config.output_dir.display());
            tracing::debug!(summary = %files.summary, "Summary written");
        }
        Ok(true)
    } else {
        println!(
            "\nTest run failed: {}",
            outcome.error.as_deref().unwrap_or("Unknown error")
        );
        Ok(false)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    load_env_file();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = ?e, "Test run failed");
            eprintln!("\nTest run failed with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
