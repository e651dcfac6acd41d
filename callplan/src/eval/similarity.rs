//! Case-insensitive string similarity.

use similar::TextDiff;

/// Matching-block ratio of two strings in `[0, 1]`, ignoring case.
///
/// Either side empty scores 0.0.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    let ratio = TextDiff::from_chars(a.as_str(), b.as_str()).ratio();
    f64::from(ratio).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::string_similarity;

    #[test]
    fn test_exact_and_case_insensitive() {
        assert_eq!(string_similarity("hello world", "hello world"), 1.0);
        assert_eq!(string_similarity("Test String", "test string"), 1.0);
    }

    #[test]
    fn test_partial_match_is_strictly_between() {
        let sim = string_similarity("hello world", "hello universe");
        assert!(sim > 0.0 && sim < 1.0, "got {sim}");
    }

    #[test]
    fn test_empty_sides_score_zero() {
        assert_eq!(string_similarity("", "test"), 0.0);
        assert_eq!(string_similarity("test", ""), 0.0);
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert_eq!(string_similarity("abc", "xyz"), 0.0);
    }
}
