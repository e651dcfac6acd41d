//! Keyword relevance heuristic for candidate contracts.
//!
//! Deterministic and model-free: this is the fallback path of contract
//! selection and never fails.

use serde::Serialize;
use shared_types::CandidateContract;

/// Intent keyword in the query → synonyms looked for in function names and
/// descriptions.
const INTENT_TABLE: &[(&str, &[&str])] = &[
    ("add", &["add", "new", "create"]),
    ("remove", &["remove", "delete", "drop"]),
    ("swap", &["swap", "replace", "change", "update"]),
    ("owner", &["owner", "owners", "ownership"]),
    ("threshold", &["threshold", "limit", "confirm", "confirmation"]),
    ("transfer", &["transfer", "send", "move"]),
    ("approve", &["approve", "allow", "permit"]),
    ("execute", &["execute", "run", "call"]),
];

struct HighValuePattern {
    function_fragment: &'static str,
    query_triggers: &'static [&'static str],
    points: i64,
}

/// Checked in order; at most one hit per function.
const HIGH_VALUE_PATTERNS: &[HighValuePattern] = &[
    HighValuePattern {
        function_fragment: "addowner",
        query_triggers: &["add", "new", "owner"],
        points: 10,
    },
    HighValuePattern {
        function_fragment: "removeowner",
        query_triggers: &["remove", "delete", "owner"],
        points: 10,
    },
    HighValuePattern {
        function_fragment: "swapowner",
        query_triggers: &["swap", "replace", "change", "owner"],
        points: 10,
    },
    HighValuePattern {
        function_fragment: "threshold",
        query_triggers: &["threshold"],
        points: 8,
    },
];

const INTENT_NAME_POINTS: i64 = 5;
const INTENT_DESCRIPTION_POINTS: i64 = 3;
const WORD_NAME_POINTS: i64 = 2;
const WORD_DESCRIPTION_POINTS: i64 = 1;
const MULTI_MATCH_BONUS: i64 = 3;
const SMALL_CONTRACT_PENALTY: i64 = 2;
const SMALL_CONTRACT_FUNCTIONS: usize = 3;
const MIN_GENERIC_WORD_LEN: usize = 4;

/// A candidate with a strictly positive relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateContract,
    pub score: i64,
    /// Distinct function names that hit a high-value pattern or an intent
    /// synonym, in first-hit order.
    pub matched_functions: Vec<String>,
}

/// Lower-cased alphanumeric words of the query, in order, duplicates kept.
pub fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn mark(name: &str, matched: &mut Vec<String>) {
    if !matched.iter().any(|m| m == name) {
        matched.push(name.to_string());
    }
}

/// Score a single candidate against a query.
pub fn score_candidate(query: &str, candidate: &CandidateContract) -> (i64, Vec<String>) {
    let query_lower = query.to_lowercase();
    let generic_words: Vec<String> = query_words(query)
        .into_iter()
        .filter(|word| word.chars().count() >= MIN_GENERIC_WORD_LEN)
        .collect();
    let active_intents: Vec<&[&str]> = INTENT_TABLE
        .iter()
        .filter(|(intent, _)| query_lower.contains(intent))
        .map(|(_, synonyms)| *synonyms)
        .collect();

    let mut score = 0i64;
    let mut matched: Vec<String> = Vec::new();
    // Every pattern or intent-name hit counts, even on an already matched name.
    let mut hits = 0usize;

    for (name, meta) in &candidate.functions {
        let name_lower = name.to_lowercase();
        let description = meta.description.to_lowercase();

        if let Some(pattern) = HIGH_VALUE_PATTERNS.iter().find(|p| {
            name_lower.contains(p.function_fragment)
                && p.query_triggers.iter().any(|t| query_lower.contains(t))
        }) {
            score += pattern.points;
            hits += 1;
            mark(name, &mut matched);
        }

        for synonyms in &active_intents {
            if synonyms.iter().any(|s| name_lower.contains(s)) {
                score += INTENT_NAME_POINTS;
                hits += 1;
                mark(name, &mut matched);
            }
            if synonyms.iter().any(|s| description.contains(s)) {
                score += INTENT_DESCRIPTION_POINTS;
            }
        }

        for word in &generic_words {
            if name_lower.contains(word.as_str()) {
                score += WORD_NAME_POINTS;
            }
            if description.contains(word.as_str()) {
                score += WORD_DESCRIPTION_POINTS;
            }
        }
    }

    if hits > 1 {
        score += MULTI_MATCH_BONUS;
    }
    if candidate.functions.len() < SMALL_CONTRACT_FUNCTIONS {
        score -= SMALL_CONTRACT_PENALTY;
    }

    (score, matched)
}

/// Rank candidates by relevance. Only positive scores are kept; ties keep the
/// input order. At most `max_results` entries.
pub fn score_candidates(
    query: &str,
    candidates: &[CandidateContract],
    max_results: usize,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter_map(|candidate| {
            let (score, matched_functions) = score_candidate(query, candidate);
            (score > 0).then(|| ScoredCandidate {
                candidate: candidate.clone(),
                score,
                matched_functions,
            })
        })
        .collect();

    // Vec::sort_by is stable.
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    for (rank, entry) in scored.iter().take(3).enumerate() {
        tracing::debug!(
            rank = rank + 1,
            address = %entry.candidate.address,
            score = entry.score,
            matched = ?entry.matched_functions.iter().take(3).collect::<Vec<_>>(),
            "Heuristic candidate"
        );
    }

    scored.truncate(max_results);
    scored
}
