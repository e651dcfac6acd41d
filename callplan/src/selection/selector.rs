//! Two-state contract selection: model-driven first, heuristic fallback.

use std::collections::HashSet;

use serde_json::Value;
use shared_types::{CandidateContract, SelectionMethod};

use crate::protocol::AgentError;
use crate::selection::model_gateway::SharedSelectionModel;
use crate::selection::scorer::score_candidates;
use crate::selection::simplify::simplify_all;

/// Which path produced (or will produce) the shortlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Validated addresses from the model, canonicalized to candidate spelling.
    ModelDriven(Vec<String>),
    /// Model unavailable or its answer unusable.
    HeuristicFallback { reason: String },
}

/// Shortlist plus the method that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSelection {
    pub addresses: Vec<String>,
    pub method: SelectionMethod,
}

impl ContractSelection {
    fn empty() -> Self {
        Self {
            addresses: Vec::new(),
            method: SelectionMethod::Heuristic,
        }
    }
}

/// Pure decision on the model outcome.
pub fn decide_strategy(
    outcome: &Result<Value, AgentError>,
    candidates: &[CandidateContract],
    max_results: usize,
) -> SelectionStrategy {
    match outcome {
        Err(e) => SelectionStrategy::HeuristicFallback {
            reason: format!("model selection failed: {e}"),
        },
        Ok(response) => match parse_model_selection(response, candidates, max_results) {
            Ok(addresses) => SelectionStrategy::ModelDriven(addresses),
            Err(reason) => SelectionStrategy::HeuristicFallback { reason },
        },
    }
}

/// Validate a `{"selected_contracts": [...]}` response against the candidate
/// set. Entries may be address strings or objects with `contract_address`.
pub fn parse_model_selection(
    response: &Value,
    candidates: &[CandidateContract],
    max_results: usize,
) -> Result<Vec<String>, String> {
    let object = response
        .as_object()
        .ok_or_else(|| "selection response is not an object".to_string())?;
    let entries = object
        .get("selected_contracts")
        .ok_or_else(|| "selection response has no selected_contracts".to_string())?
        .as_array()
        .ok_or_else(|| "selected_contracts is not a list".to_string())?;

    let mut seen = HashSet::new();
    let mut addresses = Vec::new();
    for entry in entries {
        let raw = match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("contract_address").and_then(Value::as_str),
            _ => None,
        };
        let Some(raw) = raw else {
            continue;
        };
        let wanted = raw.trim().to_lowercase();
        let Some(candidate) = candidates
            .iter()
            .find(|c| c.address.to_lowercase() == wanted)
        else {
            tracing::debug!(address = %raw, "Model selected unknown contract, dropping");
            continue;
        };
        if seen.insert(wanted) {
            addresses.push(candidate.address.clone());
        }
        if addresses.len() == max_results {
            break;
        }
    }

    if addresses.is_empty() {
        return Err("selection response contained no known contract".to_string());
    }
    Ok(addresses)
}

/// Narrows the candidate set before call generation. Never errors.
#[derive(Clone, Default)]
pub struct ContractSelector {
    model: Option<SharedSelectionModel>,
}

impl ContractSelector {
    pub fn new(model: SharedSelectionModel) -> Self {
        Self { model: Some(model) }
    }

    pub fn heuristic_only() -> Self {
        Self { model: None }
    }

    pub async fn select(
        &self,
        query: &str,
        candidates: &[CandidateContract],
        max_results: usize,
    ) -> Vec<String> {
        self.select_with_method(query, candidates, max_results)
            .await
            .addresses
    }

    pub async fn select_with_method(
        &self,
        query: &str,
        candidates: &[CandidateContract],
        max_results: usize,
    ) -> ContractSelection {
        if max_results == 0 || candidates.is_empty() {
            return ContractSelection::empty();
        }
        tracing::info!(
            candidates = candidates.len(),
            max_results,
            "Selecting contracts for query"
        );

        let strategy = match &self.model {
            Some(model) => {
                let simplified = simplify_all(candidates);
                let outcome = model
                    .select_contracts(query, &simplified, max_results)
                    .await;
                decide_strategy(&outcome, candidates, max_results)
            }
            None => SelectionStrategy::HeuristicFallback {
                reason: "no selection model configured".to_string(),
            },
        };

        match strategy {
            SelectionStrategy::ModelDriven(addresses) => {
                tracing::info!(selected = ?addresses, "Model selected contracts");
                ContractSelection {
                    addresses,
                    method: SelectionMethod::Model,
                }
            }
            SelectionStrategy::HeuristicFallback { reason } => {
                tracing::warn!(reason = %reason, "Falling back to heuristic contract selection");
                let addresses: Vec<String> = score_candidates(query, candidates, max_results)
                    .into_iter()
                    .map(|scored| scored.candidate.address)
                    .collect();
                ContractSelection {
                    addresses,
                    method: SelectionMethod::Heuristic,
                }
            }
        }
    }
}
