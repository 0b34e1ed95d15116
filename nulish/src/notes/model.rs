use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tags::parser::deserialize_tag_list;

pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Explicit tags, `/` nests and a leading `#` is ignored
    #[serde(default, deserialize_with = "deserialize_tag_list")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            tags: Vec::new(),
            is_pinned: false,
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial note for `save`: absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SaveNote {
    pub id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SaveDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FindNotesResponse {
    pub results: Vec<Note>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SearchNotes {
    /// Text searched in title and content, case-insensitive
    pub q: Option<String>,
    /// Tag path such as `work` or `work/planning`
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoteIdQuery {
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DraftAccepted {
    pub id: Uuid,
}
