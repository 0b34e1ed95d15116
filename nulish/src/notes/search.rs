use super::{Note, SearchNotes};
use crate::tags::{parser, TagPath};

pub struct NoteFilter {
    text: Option<String>,
    tag: Option<TagPath>,
}

impl NoteFilter {
    pub fn new(query: &SearchNotes) -> Self {
        Self {
            text: query
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_lowercase),
            tag: query.tag.as_deref().and_then(parser::explicit_path),
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        let text_matches = self.text.as_ref().map_or(true, |text| {
            note.title.to_lowercase().contains(text) || note.content.to_lowercase().contains(text)
        });

        text_matches
            && self.tag.as_ref().map_or(true, |tag| {
                parser::parse_paths(&note.content, &note.tags)
                    .iter()
                    .any(|path| path.starts_with(tag))
            })
    }
}

pub fn search(notes: Vec<Note>, query: &SearchNotes) -> Vec<Note> {
    let filter = NoteFilter::new(query);
    notes.into_iter().filter(|note| filter.matches(note)).collect()
}
