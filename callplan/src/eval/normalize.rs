//! Canonical string form of parameter values.

use serde::Serialize;
use shared_types::ParamValue;

/// Canonicalize a parameter value into a comparable string.
///
/// - numbers: plain decimal form
/// - text: trimmed and lower-cased
/// - booleans: `true` / `false`
/// - lists: compact JSON, sorted first when every element is text
/// - mappings: compact JSON with sorted keys
/// - null: `null`
pub fn normalize(value: &ParamValue) -> String {
    match value {
        ParamValue::Number(n) => n.to_string(),
        ParamValue::Text(s) => s.trim().to_lowercase(),
        ParamValue::Boolean(b) => b.to_string(),
        ParamValue::List(items) => {
            if items.iter().all(|item| matches!(item, ParamValue::Text(_))) {
                let mut texts: Vec<&str> = items.iter().filter_map(ParamValue::as_text).collect();
                texts.sort_unstable();
                canonical_json(&texts)
            } else {
                canonical_json(items)
            }
        }
        // BTreeMap keys serialize in sorted order at every depth.
        ParamValue::Mapping(map) => canonical_json(map),
        ParamValue::Null => "null".to_string(),
    }
}

fn canonical_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
