//! Collaborator seams of the query pipeline.

use async_trait::async_trait;
use std::sync::Arc;

use shared_types::{AgentResult, CandidateContract, FunctionCall};

use crate::protocol::AgentError;

pub type SharedFunctionCallGenerator = Arc<dyn FunctionCallGenerator>;
pub type SharedQueryRewriter = Arc<dyn QueryRewriter>;
pub type SharedQueryAgent = Arc<dyn QueryAgent>;

/// Stage 2: turn a (rewritten) query into calls against a focused contract set.
#[async_trait]
pub trait FunctionCallGenerator: Send + Sync {
    async fn generate_function_calls(
        &self,
        query: &str,
        contracts: &[CandidateContract],
    ) -> Result<Vec<FunctionCall>, AgentError>;
}

/// Restate the user's query precisely, given the most relevant contract.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite_query(
        &self,
        query: &str,
        context: &CandidateContract,
    ) -> Result<String, AgentError>;
}

/// Anything the test runner can drive with a natural-language query.
///
/// `Err` means the attempt could not be made at all; an `Ok` result with
/// `success == false` is an attempt that ran and failed. The runner retries
/// both.
#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn process_query(&self, query: &str) -> Result<AgentResult, AgentError>;
}
