//! Two-stage query pipeline: select contracts, rewrite, generate calls.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{AgentResult, CandidateContract};

use crate::agent::gateway::{QueryAgent, SharedFunctionCallGenerator, SharedQueryRewriter};
use crate::protocol::AgentError;
use crate::selection::{CandidateCache, ContractSelector};

pub const DEFAULT_MAX_CONTRACTS: usize = 3;

pub const NO_CANDIDATES: &str = "No candidate contracts available";
pub const NO_RELEVANT_CONTRACTS: &str = "No relevant contracts found for the query";
pub const PROCESSING_FAILED_PREFIX: &str = "Failed to process query: ";

pub struct ContractAgent {
    cache: Arc<CandidateCache>,
    selector: ContractSelector,
    rewriter: SharedQueryRewriter,
    generator: SharedFunctionCallGenerator,
    max_contracts: usize,
}

impl ContractAgent {
    pub fn new(
        cache: Arc<CandidateCache>,
        selector: ContractSelector,
        rewriter: SharedQueryRewriter,
        generator: SharedFunctionCallGenerator,
    ) -> Self {
        Self {
            cache,
            selector,
            rewriter,
            generator,
            max_contracts: DEFAULT_MAX_CONTRACTS,
        }
    }

    pub fn with_max_contracts(mut self, max_contracts: usize) -> Self {
        self.max_contracts = max_contracts;
        self
    }

    /// Run the pipeline. Every failure is reported in the returned result.
    pub async fn run(&self, query: &str) -> AgentResult {
        tracing::info!(query = %query, "Processing query");

        let candidates = match self.cache.candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load candidate contracts");
                return with_query(
                    AgentResult::failure(format!("{PROCESSING_FAILED_PREFIX}{e}")),
                    query,
                );
            }
        };
        if candidates.is_empty() {
            tracing::warn!("No candidate contracts loaded");
            return with_query(AgentResult::failure(NO_CANDIDATES), query);
        }

        let selection = self
            .selector
            .select_with_method(query, &candidates, self.max_contracts)
            .await;
        if selection.addresses.is_empty() {
            return with_query(AgentResult::failure(NO_RELEVANT_CONTRACTS), query);
        }

        let focused: Vec<CandidateContract> = selection
            .addresses
            .iter()
            .filter_map(|address| candidates.iter().find(|c| &c.address == address).cloned())
            .collect();

        match self.generate(query, &focused).await {
            Ok((rewritten, calls)) => {
                tracing::info!(
                    selected = focused.len(),
                    calls = calls.len(),
                    method = selection.method.as_str(),
                    "Query processed"
                );
                AgentResult {
                    success: true,
                    original_query: Some(query.to_string()),
                    rewritten_query: Some(rewritten),
                    selected_contract_address: selection.addresses.first().cloned(),
                    selected_contracts: selection.addresses,
                    selection_method: Some(selection.method),
                    produced_calls: Some(calls),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, code = e.code(), "Query processing failed");
                let mut result = with_query(
                    AgentResult::failure(format!("{PROCESSING_FAILED_PREFIX}{e}")),
                    query,
                );
                result.selected_contracts = selection.addresses;
                result.selection_method = Some(selection.method);
                result
            }
        }
    }

    async fn generate(
        &self,
        query: &str,
        focused: &[CandidateContract],
    ) -> Result<(String, Vec<shared_types::FunctionCall>), AgentError> {
        let best = focused
            .first()
            .ok_or_else(|| AgentError::InvalidResponse("selected contract not in candidate set".to_string()))?;

        let rewritten = self.rewriter.rewrite_query(query, best).await?;
        tracing::debug!(rewritten = %rewritten, "Rewrote query");

        let calls = self
            .generator
            .generate_function_calls(&rewritten, focused)
            .await?;
        Ok((rewritten, calls))
    }
}

fn with_query(mut result: AgentResult, query: &str) -> AgentResult {
    result.original_query = Some(query.to_string());
    result
}

#[async_trait]
impl QueryAgent for ContractAgent {
    async fn process_query(&self, query: &str) -> Result<AgentResult, AgentError> {
        Ok(self.run(query).await)
    }
}
