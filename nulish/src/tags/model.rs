use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nested tag as segments, `["work", "planning"]` for `work/planning`.
pub type TagPath = Vec<String>;

/// One path segment of the tag forest.
///
/// Identity is the [`TagKey`] (`name`, `parent_id`), not `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKey {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

impl TagKey {
    pub fn new(name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            name: name.into(),
            parent_id,
        }
    }
}

impl Tag {
    pub fn key(&self) -> TagKey {
        TagKey::new(self.name.clone(), self.parent_id)
    }
}

/// Sidebar node: a tag with its full path and nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TagNode {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub children: Vec<TagNode>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindTagsResponse {
    pub results: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReplaceTags {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TagTreeResponse {
    pub results: Vec<TagNode>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestTags {
    /// Part of a tag name, matched case-insensitively
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RebuildTagsResponse {
    /// Whether the stored tag set was replaced
    pub changed: bool,
    pub results: Vec<Tag>,
}
