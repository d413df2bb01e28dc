//! C4 Content Validator — heuristically rejects editor key/value noise
//! (workbench panel state, telemetry blobs) that lives in the same
//! `ItemTable` as real conversation data. Grounded in spec §4.4; the
//! indicator word lists and thresholds live in `config.rs`.

use serde_json::Value;

use crate::config::{
    CONTENT_KEYS, FALSE_POSITIVE_INDICATORS, FALSE_POSITIVE_RATIO_THRESHOLD, MAX_ANALYSIS_LEN,
    MAX_LIST_ITEMS_TO_CHECK, MIN_CONTENT_LEN, STRONG_INDICATORS,
};

/// Heuristic verdict on whether `candidate` looks like real conversation
/// data rather than editor/UI state.
pub fn is_conversation_like(candidate: &Value) -> bool {
    if !candidate.is_object() && !candidate.is_array() {
        return false;
    }

    let serialized = serde_json::to_string(candidate).unwrap_or_default();
    let lower: String = serialized.chars().take(MAX_ANALYSIS_LEN).collect::<String>().to_lowercase();

    let strong_count = count_hits(&lower, STRONG_INDICATORS);
    let false_positive_count = count_hits(&lower, FALSE_POSITIVE_INDICATORS);

    if strong_count == 0 {
        return false;
    }
    if (false_positive_count as f64) > (strong_count as f64) * FALSE_POSITIVE_RATIO_THRESHOLD {
        return false;
    }

    structural_check(candidate)
}

fn count_hits(haystack: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| haystack.contains(*w)).count()
}

fn structural_check(candidate: &Value) -> bool {
    match candidate {
        Value::Object(map) => CONTENT_KEYS.iter().any(|key| {
            map.get(*key)
                .map(|v| is_non_trivial_content(v))
                .unwrap_or(false)
        }),
        Value::Array(items) => items
            .iter()
            .take(MAX_LIST_ITEMS_TO_CHECK)
            .any(looks_like_message_item),
        _ => false,
    }
}

fn is_non_trivial_content(value: &Value) -> bool {
    match value {
        Value::String(s) => s.len() >= MIN_CONTENT_LEN,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

fn looks_like_message_item(item: &Value) -> bool {
    let Value::Object(map) = item else {
        return false;
    };
    let has_content_key = CONTENT_KEYS.iter().any(|key| map.contains_key(*key));
    let has_message_indicator = STRONG_INDICATORS.iter().any(|ind| map.contains_key(*ind));
    has_content_key && has_message_indicator
}
