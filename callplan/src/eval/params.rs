//! Named-parameter comparison with amount tolerance.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shared_types::ParameterSet;

use super::normalize::normalize;
use super::similarity::string_similarity;

/// Result of comparing two parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterComparison {
    pub exact_match: bool,
    pub similarity: f64,
}

impl ParameterComparison {
    const IDENTICAL: Self = Self {
        exact_match: true,
        similarity: 1.0,
    };
    const DISJOINT: Self = Self {
        exact_match: false,
        similarity: 0.0,
    };
}

/// Compare actual parameters against expected ones.
///
/// Similarity is the mean of key overlap (Jaccard) and the mean per-key value
/// similarity over common keys.
pub fn compare_parameters(actual: &ParameterSet, expected: &ParameterSet) -> ParameterComparison {
    match (actual.is_empty(), expected.is_empty()) {
        (true, true) => return ParameterComparison::IDENTICAL,
        (true, false) | (false, true) => return ParameterComparison::DISJOINT,
        (false, false) => {}
    }

    let actual_keys: BTreeSet<&str> = actual.keys().map(String::as_str).collect();
    let expected_keys: BTreeSet<&str> = expected.keys().map(String::as_str).collect();
    let common: Vec<&str> = actual_keys.intersection(&expected_keys).copied().collect();
    let union_len = actual_keys.union(&expected_keys).count();

    let key_similarity = common.len() as f64 / union_len as f64;

    let mut exact_values = 0usize;
    let mut value_scores = Vec::with_capacity(common.len());
    for key in &common {
        let (Some(a), Some(e)) = (actual.get(*key), expected.get(*key)) else {
            continue;
        };
        let a = normalize(a);
        let e = normalize(e);

        if a == e {
            exact_values += 1;
            value_scores.push(1.0);
        } else if is_amount_like(key) {
            match numeric_closeness(&a, &e) {
                Some(score) => value_scores.push(score),
                None => value_scores.push(string_similarity(&a, &e)),
            }
        } else {
            value_scores.push(string_similarity(&a, &e));
        }
    }

    let value_similarity = if value_scores.is_empty() {
        0.0
    } else {
        value_scores.iter().sum::<f64>() / value_scores.len() as f64
    };

    ParameterComparison {
        exact_match: actual_keys == expected_keys && exact_values == expected.len(),
        similarity: (key_similarity + value_similarity) / 2.0,
    }
}

/// `amount`, `value`, or anything ending in `fee`, case-insensitive.
pub fn is_amount_like(key: &str) -> bool {
    let key = key.to_lowercase();
    key == "amount" || key == "value" || key.ends_with("fee")
}

/// `max(0, 1 - |a-b| / max(a, b, 1))` for two non-negative integer strings.
///
/// Returns `None` when either side is not a plain digit string.
pub fn numeric_closeness(a: &str, b: &str) -> Option<f64> {
    if !is_digits(a) || !is_digits(b) {
        return None;
    }
    let closeness = match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => {
            let diff = x.abs_diff(y) as f64;
            diff / x.max(y).max(1) as f64
        }
        // Beyond u128: fall back to float magnitudes.
        _ => {
            let x: f64 = a.parse().ok()?;
            let y: f64 = b.parse().ok()?;
            (x - y).abs() / x.max(y).max(1.0)
        }
    };
    Some((1.0 - closeness).max(0.0))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ParamValue;

    fn params(pairs: &[(&str, &str)]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ParamValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_empty_sets() {
        let empty = ParameterSet::new();
        assert_eq!(
            compare_parameters(&empty, &empty),
            ParameterComparison {
                exact_match: true,
                similarity: 1.0
            }
        );
        let one = params(&[("k", "v")]);
        assert_eq!(
            compare_parameters(&one, &empty),
            ParameterComparison {
                exact_match: false,
                similarity: 0.0
            }
        );
        assert!(!compare_parameters(&empty, &one).exact_match);
    }

    #[test]
    fn test_identical_parameters() {
        let p = params(&[("token", "0xT"), ("amount", "150000000000000000000")]);
        let cmp = compare_parameters(&p, &p.clone());
        assert!(cmp.exact_match);
        assert_eq!(cmp.similarity, 1.0);
    }

    #[test]
    fn test_amount_tolerance() {
        let actual = params(&[("token", "0xT"), ("amount", "150000000000000000000")]);
        let expected = params(&[("token", "0xT"), ("amount", "140000000000000000000")]);
        let cmp = compare_parameters(&actual, &expected);
        assert!(!cmp.exact_match);
        assert!(cmp.similarity > 0.0 && cmp.similarity < 1.0);
        // key overlap 1.0, values (1.0 + 14/15) / 2
        let expected_sim = (1.0 + (1.0 + 14.0 / 15.0) / 2.0) / 2.0;
        assert!((cmp.similarity - expected_sim).abs() < 1e-9);
    }

    #[test]
    fn test_case_insensitive_values_are_exact() {
        let actual = params(&[("owner", "0xABCDEF")]);
        let expected = params(&[("owner", "0xabcdef")]);
        assert!(compare_parameters(&actual, &expected).exact_match);
    }

    #[test]
    fn test_missing_key_is_not_exact() {
        let actual = params(&[("token", "0xT")]);
        let expected = params(&[("token", "0xT"), ("amount", "1")]);
        let cmp = compare_parameters(&actual, &expected);
        assert!(!cmp.exact_match);
        assert!((cmp.similarity - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_keys_score_zero_values() {
        let actual = params(&[("a", "1")]);
        let expected = params(&[("b", "1")]);
        let cmp = compare_parameters(&actual, &expected);
        assert!(!cmp.exact_match);
        assert_eq!(cmp.similarity, 0.0);
    }

    #[test]
    fn test_numeric_closeness() {
        assert_eq!(numeric_closeness("100", "100"), Some(1.0));
        assert_eq!(numeric_closeness("0", "0"), Some(1.0));
        assert_eq!(numeric_closeness("50", "100"), Some(0.5));
        assert_eq!(numeric_closeness("0", "100"), Some(0.0));
        assert_eq!(numeric_closeness("-5", "5"), None);
        assert_eq!(numeric_closeness("1.5", "2"), None);
        let huge = "9".repeat(50);
        assert_eq!(numeric_closeness(&huge, &huge), Some(1.0));
    }

    #[test]
    fn test_amount_like_keys() {
        assert!(is_amount_like("amount"));
        assert!(is_amount_like("Value"));
        assert!(is_amount_like("bridgeFee"));
        assert!(is_amount_like("FEE"));
        assert!(!is_amount_like("amountOut"));
        assert!(!is_amount_like("token"));
    }

    #[test]
    fn test_wei_sized_json_numbers_compare_exactly() {
        let parse = |json: &str| serde_json::from_str::<ParameterSet>(json).unwrap();
        let actual = parse(r#"{"amount": 150000000000000000001}"#);
        let expected = parse(r#"{"amount": 150000000000000000000}"#);

        assert_eq!(
            normalize(&actual["amount"]),
            "150000000000000000001"
        );

        // Off by one wei: not exact, though the closeness rounds to 1.0.
        let cmp = compare_parameters(&actual, &expected);
        assert!(!cmp.exact_match);
        assert!(cmp.similarity > 0.99);

        // A JSON number equals the same amount written as a string.
        let as_text = params(&[("amount", "150000000000000000000")]);
        assert_eq!(
            compare_parameters(&expected, &as_text),
            ParameterComparison {
                exact_match: true,
                similarity: 1.0
            }
        );
    }
}
