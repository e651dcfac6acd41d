//! Token-light candidate summaries for the model-driven selection call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::CandidateContract;

pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Category → function-name fragments, matched against all function names
/// joined together.
const CATEGORY_PATTERNS: &[(&str, &[&str])] = &[
    (
        "multisig",
        &["addowner", "removeowner", "swapowner", "changethreshold", "getowners"],
    ),
    ("erc20", &["transfer", "approve", "allowance", "balanceof", "totalsupply"]),
    (
        "erc721",
        &["mint", "burn", "tokenuri", "ownerof", "approve", "transferfrom"],
    ),
    ("bridge", &["deposit", "withdraw", "bridge", "relay"]),
    ("swap", &["swap", "addliquidity", "removeliquidity", "getamountout"]),
    ("vault", &["stake", "unstake", "reward", "harvest"]),
    ("governance", &["propose", "vote", "execute", "cancel"]),
    ("multicall", &["multicall", "aggregate", "tryaggregate"]),
    ("proxy", &["upgrade", "implementation", "admin"]),
    ("pausable", &["pause", "unpause", "paused"]),
    ("ownable", &["owner", "transferownership", "renounceownership"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub address: String,
    pub contract_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedFunction {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parameter_count: usize,
}

/// What the selection model sees for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedContract {
    pub contract_info: ContractInfo,
    pub functions: BTreeMap<String, SimplifiedFunction>,
    pub function_count: usize,
    pub categories: Vec<String>,
}

pub fn simplify(candidate: &CandidateContract) -> SimplifiedContract {
    let functions: BTreeMap<String, SimplifiedFunction> = candidate
        .functions
        .iter()
        .map(|(name, meta)| {
            (
                name.clone(),
                SimplifiedFunction {
                    name: name.clone(),
                    description: meta.description.chars().take(MAX_DESCRIPTION_CHARS).collect(),
                    kind: "function".to_string(),
                    parameter_count: meta.parameters.len(),
                },
            )
        })
        .collect();

    SimplifiedContract {
        contract_info: ContractInfo {
            address: candidate.address.clone(),
            contract_id: candidate.identifier.clone(),
        },
        function_count: functions.len(),
        categories: infer_categories(functions.keys().map(String::as_str)),
        functions,
    }
}

/// Simplified form of every candidate, keyed by address.
pub fn simplify_all(candidates: &[CandidateContract]) -> BTreeMap<String, SimplifiedContract> {
    candidates
        .iter()
        .map(|c| (c.address.clone(), simplify(c)))
        .collect()
}

/// Categories in table order.
pub fn infer_categories<'a>(function_names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let joined = function_names
        .into_iter()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    CATEGORY_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| joined.contains(p)))
        .map(|(category, _)| category.to_string())
        .collect()
}
