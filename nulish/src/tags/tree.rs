//! Canonical tag forest derived from every note.
//!
//! The whole set is rebuilt from scratch on each derivation. Work is
//! O(notes x tag occurrences), fine for a personal corpus.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use super::{parser, Tag, TagKey, TagNode, TagPath};
use crate::notes::Note;

pub struct TagTreeBuilder<'a> {
    tags: IndexMap<TagKey, Tag>,
    existing: HashMap<TagKey, &'a Tag>,
    started_at: DateTime<Utc>,
}

impl<'a> TagTreeBuilder<'a> {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            tags: IndexMap::new(),
            existing: HashMap::new(),
            started_at,
        }
    }

    /// Reuse `id` and `created_at` of already persisted tags with the same key.
    pub fn with_existing(mut self, existing: &'a [Tag]) -> Self {
        self.existing = existing.iter().map(|tag| (tag.key(), tag)).collect();
        self
    }

    pub fn add_note(&mut self, note: &Note) {
        for path in parser::parse_paths(&note.content, &note.tags) {
            self.add_path(&path);
        }
    }

    pub fn add_path(&mut self, path: &TagPath) {
        let mut parent_id = None;

        for segment in path {
            let key = TagKey::new(segment.as_str(), parent_id);

            let id = match self.tags.get(&key) {
                Some(tag) => tag.id,
                None => {
                    let tag = match self.existing.get(&key) {
                        Some(existing) => Tag {
                            id: existing.id,
                            name: segment.clone(),
                            parent_id,
                            created_at: existing.created_at,
                        },
                        None => Tag {
                            id: Uuid::now_v7(),
                            name: segment.clone(),
                            parent_id,
                            created_at: self.started_at,
                        },
                    };
                    let id = tag.id;
                    self.tags.insert(key, tag);
                    id
                }
            };

            parent_id = Some(id);
        }
    }

    pub fn build(self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.tags.into_values().collect();
        sort_tags(&mut tags);
        tags
    }
}

/// Rebuilds the canonical tag set from all notes.
pub fn build_tag_tree(notes: &[Note], existing: &[Tag]) -> Vec<Tag> {
    let mut builder = TagTreeBuilder::new(Utc::now()).with_existing(existing);
    for note in notes {
        builder.add_note(note);
    }
    let tags = builder.build();

    tracing::debug!(notes = notes.len(), tags = tags.len(), "rebuilt tag tree");
    tags
}

/// Presentation order: case-folded name, then exact name, then id.
pub fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(compare_tags);
}

fn compare_tags(a: &Tag, b: &Tag) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Full slash path of `tag`, walking parents. Stops at a missing parent or a cycle.
pub fn path_of(tag: &Tag, tags: &[Tag]) -> String {
    let by_id: HashMap<Uuid, &Tag> = tags.iter().map(|t| (t.id, t)).collect();
    lineage(tag, &by_id).join("/")
}

fn lineage<'t>(tag: &'t Tag, by_id: &HashMap<Uuid, &'t Tag>) -> Vec<&'t str> {
    let mut segments = vec![tag.name.as_str()];
    let mut seen = HashSet::from([tag.id]);
    let mut parent_id = tag.parent_id;

    while let Some(parent) = parent_id.and_then(|id| by_id.get(&id).copied()) {
        if !seen.insert(parent.id) {
            break;
        }
        segments.push(parent.name.as_str());
        parent_id = parent.parent_id;
    }

    segments.reverse();
    segments
}

/// Sorted full paths of every tag.
pub fn paths(tags: &[Tag]) -> Vec<String> {
    let by_id: HashMap<Uuid, &Tag> = tags.iter().map(|t| (t.id, t)).collect();
    let mut paths: Vec<String> = tags.iter().map(|tag| lineage(tag, &by_id).join("/")).collect();
    paths.sort();
    paths
}

/// Nests a flat tag set for the sidebar.
///
/// Only tags reachable from a root are returned, so dangling parents and
/// cycles in replaced tag sets are dropped instead of looping.
pub fn nest(tags: &[Tag]) -> Vec<TagNode> {
    let mut sorted = tags.to_vec();
    sort_tags(&mut sorted);

    let mut children: HashMap<Option<Uuid>, Vec<&Tag>> = HashMap::new();
    for tag in &sorted {
        children.entry(tag.parent_id).or_default().push(tag);
    }

    let mut visited = HashSet::new();

    sorted
        .iter()
        .filter(|tag| tag.parent_id.is_none())
        .filter_map(|tag| nest_node(tag, "", &children, &mut visited))
        .collect()
}

fn nest_node(
    tag: &Tag,
    prefix: &str,
    children: &HashMap<Option<Uuid>, Vec<&Tag>>,
    visited: &mut HashSet<Uuid>,
) -> Option<TagNode> {
    if !visited.insert(tag.id) {
        return None;
    }

    let path = if prefix.is_empty() {
        tag.name.clone()
    } else {
        format!("{prefix}/{}", tag.name)
    };

    let nested = children
        .get(&Some(tag.id))
        .map(|kids| {
            kids.iter()
                .filter_map(|child| nest_node(child, &path, children, visited))
                .collect()
        })
        .unwrap_or_default();

    Some(TagNode {
        id: tag.id,
        name: tag.name.clone(),
        path,
        children: nested,
    })
}
