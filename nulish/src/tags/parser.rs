//! Tag path extraction from note bodies and explicit tag lists.
//!
//! Inline hashtags look like `#work/project`: a hash mark, word characters,
//! then any number of `/word` groups. Explicit tags may carry one leading
//! `#` and use `/` for nesting.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::TagPath;

lazy_static! {
    static ref HASHTAG: Regex = Regex::new(r"#\w+(?:/\w+)*").unwrap();
}

/// All tag paths of one note. Order is not significant and duplicates are kept.
pub fn parse_paths(content: &str, tags: &[String]) -> Vec<TagPath> {
    let mut paths = inline_paths(content);
    paths.extend(tags.iter().filter_map(|tag| explicit_path(tag)));
    paths
}

pub fn inline_paths(content: &str) -> Vec<TagPath> {
    HASHTAG
        .find_iter(content)
        .map(|m| m.as_str()[1..].split('/').map(str::to_string).collect())
        .collect()
}

/// `" #work / planning "` becomes `["work", "planning"]`; blank entries yield `None`.
pub fn explicit_path(tag: &str) -> Option<TagPath> {
    let tag = tag.trim();
    let tag = tag.strip_prefix('#').unwrap_or(tag);

    let path: TagPath = tag
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    (!path.is_empty()).then_some(path)
}

/// Decodes a stored tag list.
///
/// Accepts a JSON array of strings or a JSON string holding one. Non-string
/// items are dropped and anything else decodes to no tags.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => tag_list_from_value(value),
        Err(error) => {
            tracing::warn!(%error, "malformed tag list, ignoring");
            Vec::new()
        }
    }
}

pub fn tag_list_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect(),
        Value::String(nested) => parse_tag_list(&nested),
        Value::Null => Vec::new(),
        other => {
            tracing::warn!(value = %other, "tag list is not an array, ignoring");
            Vec::new()
        }
    }
}

/// Serde adapter for `tags` fields that must never fail a whole record.
pub fn deserialize_tag_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <Value as serde::Deserialize>::deserialize(deserializer)?;
    Ok(tag_list_from_value(value))
}
