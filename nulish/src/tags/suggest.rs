use super::Tag;

/// Tags whose name contains `query`, ignoring case. A blank query suggests nothing.
pub fn suggest(tags: &[Tag], query: &str) -> Vec<Tag> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    tags.iter()
        .filter(|tag| tag.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}
