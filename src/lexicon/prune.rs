//! Entry pruning
//!
//! Dictionary entries carry bookkeeping fields and inline HTML the oracle has
//! no use for. Entries are reduced to their descriptive fields, with markup
//! stripped from every string, before they enter a prompt.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Fields kept when an entry is shown to the oracle
const PRUNED_FIELDS: &[&str] = &[
    "headword",
    "parent_lexicon",
    "alt_headwords",
    "morphology",
    "content",
];

/// Any HTML tag, including tags spanning lines
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Remove all HTML tags, keeping their text content
pub fn strip_html(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// Recursively strip HTML from every string inside a JSON value
pub fn clean_nested_html(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_html(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_nested_html).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clean_nested_html(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Keep only descriptive fields of a raw entry and strip their markup
pub fn prune_entry(raw: &Map<String, Value>) -> Value {
    let kept: Map<String, Value> = raw
        .iter()
        .filter(|(k, _)| PRUNED_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), clean_nested_html(v.clone())))
        .collect();
    Value::Object(kept)
}
