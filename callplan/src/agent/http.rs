//! HTTP client for a remote agent service exposing the model-backed
//! collaborators (contract selection, query rewrite, call generation).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{CandidateContract, FunctionCall, FunctionCallPlan};

use crate::agent::gateway::{FunctionCallGenerator, QueryRewriter};
use crate::protocol::AgentError;
use crate::selection::model_gateway::ContractSelectionModel;
use crate::selection::simplify::SimplifiedContract;

const SELECT_PATH: &str = "/contracts/select";
const REWRITE_PATH: &str = "/query/rewrite";
const GENERATE_PATH: &str = "/functions/generate";

#[derive(Serialize)]
struct SelectRequest<'a> {
    query: &'a str,
    max_contracts: usize,
    model_name: &'a str,
    candidates: &'a BTreeMap<String, SimplifiedContract>,
}

#[derive(Serialize)]
struct RewriteRequest<'a> {
    query: &'a str,
    contract_context: &'a CandidateContract,
    model_name: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    query: &'a str,
    selected_contracts: &'a [CandidateContract],
    model_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    rewritten_query: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    function_calls: Option<FunctionCallPlan>,
    #[serde(default)]
    error: Option<String>,
}

/// Implements every collaborator trait against one base URL.
#[derive(Debug, Clone)]
pub struct HttpAgentGateway {
    http: reqwest::Client,
    base_url: String,
    model_name: String,
    timeout_ms: u64,
}

impl HttpAgentGateway {
    pub fn new(
        base_url: impl Into<String>,
        model_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_name: model_name.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, AgentError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout_ms)
                } else {
                    AgentError::Transport(format!("{path}: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(format!("{path}: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::Upstream(format!(
                "{path} returned {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| AgentError::InvalidResponse(format!("{path}: {e}")))
    }
}

#[async_trait]
impl ContractSelectionModel for HttpAgentGateway {
    async fn select_contracts(
        &self,
        query: &str,
        candidates: &BTreeMap<String, SimplifiedContract>,
        max_contracts: usize,
    ) -> Result<serde_json::Value, AgentError> {
        let request = SelectRequest {
            query,
            max_contracts,
            model_name: &self.model_name,
            candidates,
        };
        self.post(SELECT_PATH, &request).await
    }
}

#[async_trait]
impl QueryRewriter for HttpAgentGateway {
    async fn rewrite_query(
        &self,
        query: &str,
        context: &CandidateContract,
    ) -> Result<String, AgentError> {
        let request = RewriteRequest {
            query,
            contract_context: context,
            model_name: &self.model_name,
        };
        let response: RewriteResponse = self.post(REWRITE_PATH, &request).await?;
        if !response.success {
            return Err(upstream_failure(response.error, "query rewrite"));
        }
        response
            .rewritten_query
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| AgentError::InvalidResponse("rewrite returned no query".to_string()))
    }
}

#[async_trait]
impl FunctionCallGenerator for HttpAgentGateway {
    async fn generate_function_calls(
        &self,
        query: &str,
        contracts: &[CandidateContract],
    ) -> Result<Vec<FunctionCall>, AgentError> {
        let request = GenerateRequest {
            query,
            selected_contracts: contracts,
            model_name: &self.model_name,
        };
        let response: GenerateResponse = self.post(GENERATE_PATH, &request).await?;
        if !response.success {
            return Err(upstream_failure(response.error, "function call generation"));
        }
        response
            .function_calls
            .map(|plan| plan.function_calling)
            .ok_or_else(|| {
                AgentError::InvalidResponse("generation returned no function_calls".to_string())
            })
    }
}

fn upstream_failure(error: Option<String>, stage: &str) -> AgentError {
    AgentError::Upstream(error.unwrap_or_else(|| format!("{stage} failed without an error message")))
}
