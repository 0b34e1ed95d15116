//! Note CRUD that keeps the derived tag set current.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use super::{search, Note, SaveNote, SearchNotes, UNTITLED};
use crate::{
    cache::CollectionCache,
    events::{ChangeEvent, Notifier},
    store::Store,
    tags::{suggest, tree, FingerprintMode, Reconciliation, Tag, TagNode, TagReconciler},
    Error, Result,
};

#[derive(Debug, Clone, Copy)]
pub struct RepositoryOptions {
    pub cache_ttl: Duration,
    pub fingerprint: FingerprintMode,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(100),
            fingerprint: FingerprintMode::Names,
        }
    }
}

#[derive(Clone)]
pub struct NoteRepository {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    reconciler: TagReconciler,
    events: Notifier,
    notes: CollectionCache<Note>,
    tags: CollectionCache<Tag>,
    changes: Mutex<broadcast::Receiver<ChangeEvent>>,
}

impl NoteRepository {
    pub fn new(store: Arc<dyn Store>, events: Notifier, options: RepositoryOptions) -> Self {
        let reconciler = TagReconciler::new(store.clone(), events.clone(), options.fingerprint);
        let changes = Mutex::new(events.subscribe());

        Self {
            inner: Arc::new(Inner {
                store,
                reconciler,
                events,
                notes: CollectionCache::new(options.cache_ttl),
                tags: CollectionCache::new(options.cache_ttl),
                changes,
            }),
        }
    }

    pub fn events(&self) -> &Notifier {
        &self.inner.events
    }

    /// Drops cached collections that someone else announced as changed.
    fn apply_invalidations(&self) {
        let mut changes = self.inner.changes.lock();
        loop {
            match changes.try_recv() {
                Ok(ChangeEvent::NotesChanged) => self.inner.notes.invalidate(),
                Ok(ChangeEvent::TagsChanged) => self.inner.tags.invalidate(),
                Err(TryRecvError::Lagged(_)) => {
                    self.inner.notes.invalidate();
                    self.inner.tags.invalidate();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Read failures are logged and served as an empty collection.
    async fn cached_notes(&self) -> Result<Vec<Note>> {
        self.apply_invalidations();
        let store = &self.inner.store;
        match self.inner.notes.get_or_fetch(|| store.list_notes()).await {
            Ok(notes) => Ok(notes),
            Err(error) => {
                tracing::error!(%error, "failed to read notes");
                Ok(Vec::new())
            }
        }
    }

    async fn cached_tags(&self) -> Result<Vec<Tag>> {
        self.apply_invalidations();
        let store = &self.inner.store;
        match self.inner.tags.get_or_fetch(|| store.list_tags()).await {
            Ok(tags) => Ok(tags),
            Err(error) => {
                tracing::error!(%error, "failed to read tags");
                Ok(Vec::new())
            }
        }
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Note>> {
        let mut notes = self.cached_notes().await?;
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(notes)
    }

    pub async fn get(&self, id: Uuid) -> Result<Note> {
        self.cached_notes()
            .await?
            .into_iter()
            .find(|note| note.id == id)
            .ok_or_else(|| Error::NotFound("Note not found".into()))
    }

    pub async fn published(&self, id: Uuid) -> Result<Note> {
        self.inner
            .store
            .get_published(id)
            .await?
            .ok_or_else(|| Error::NotFound("Note not found or not published".into()))
    }

    pub async fn search(&self, query: &SearchNotes) -> Result<Vec<Note>> {
        Ok(search::search(self.list().await?, query))
    }

    /// Merges into the note with `input.id`, or creates a note with a fresh id
    /// when the id is absent or unknown. Tags are re-derived afterwards.
    pub async fn save(&self, input: SaveNote) -> Result<Note> {
        let now = Utc::now();
        let notes = self.inner.store.list_notes().await?;

        let note = match input.id.and_then(|id| notes.into_iter().find(|n| n.id == id)) {
            Some(existing) => merge(existing, input, now),
            None => create(input, now),
        };

        self.inner.store.upsert_note(&note).await?;
        tracing::debug!(note_id = %note.id, "note saved");

        self.after_note_write().await;
        Ok(note)
    }

    /// Stores `note` exactly as given, keyed by its id.
    pub async fn put(&self, note: Note) -> Result<Note> {
        self.inner.store.upsert_note(&note).await?;
        tracing::debug!(note_id = %note.id, "note stored");

        self.after_note_write().await;
        Ok(note)
    }

    /// Removes a note. Tags are not re-derived here and may list tags
    /// only the deleted note used until the next derivation.
    pub async fn delete(&self, id: Uuid) -> Result<Note> {
        let note = self
            .inner
            .store
            .list_notes()
            .await?
            .into_iter()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::NotFound("Note not found".into()))?;

        self.inner.store.delete_note(id).await?;
        tracing::debug!(note_id = %id, "note deleted");

        self.inner.notes.invalidate();
        self.inner.events.notify(ChangeEvent::NotesChanged);
        Ok(note)
    }

    async fn after_note_write(&self) {
        self.inner.notes.invalidate();
        self.inner.events.notify(ChangeEvent::NotesChanged);

        if let Err(error) = self.rebuild_tags().await {
            tracing::error!(%error, "tag derivation failed after note write");
        }
    }

    /// Re-derives tags from the current notes.
    pub async fn rebuild_tags(&self) -> Result<Reconciliation> {
        let notes = self.inner.store.list_notes().await?;
        let outcome = self.inner.reconciler.reconcile(&notes).await?;
        if outcome.changed() {
            self.inner.tags.invalidate();
        }
        Ok(outcome)
    }

    /// Canonical tag set in presentation order.
    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let mut tags = self.cached_tags().await?;
        tree::sort_tags(&mut tags);
        Ok(tags)
    }

    pub async fn tag_tree(&self) -> Result<Vec<TagNode>> {
        Ok(tree::nest(&self.cached_tags().await?))
    }

    pub async fn suggest_tags(&self, query: &str) -> Result<Vec<Tag>> {
        Ok(suggest::suggest(&self.tags().await?, query))
    }

    /// Replaces the whole tag collection as given.
    pub async fn replace_tags(&self, tags: Vec<Tag>) -> Result<Vec<Tag>> {
        self.inner.store.replace_tags(&tags).await?;
        self.inner.tags.invalidate();
        self.inner.events.notify(ChangeEvent::TagsChanged);

        let mut tags = tags;
        tree::sort_tags(&mut tags);
        Ok(tags)
    }
}

fn title_or_untitled(title: String) -> String {
    if title.trim().is_empty() {
        UNTITLED.into()
    } else {
        title
    }
}

fn create(input: SaveNote, now: DateTime<Utc>) -> Note {
    Note {
        title: title_or_untitled(input.title.unwrap_or_default()),
        content: input.content.unwrap_or_default(),
        tags: input.tags.unwrap_or_default(),
        is_pinned: input.is_pinned.unwrap_or_default(),
        is_published: input.is_published.unwrap_or_default(),
        ..Note::new(Uuid::now_v7(), now)
    }
}

fn merge(mut note: Note, input: SaveNote, now: DateTime<Utc>) -> Note {
    if let Some(title) = input.title {
        note.title = title_or_untitled(title);
    }
    if let Some(content) = input.content {
        note.content = content;
    }
    if let Some(tags) = input.tags {
        note.tags = tags;
    }
    if let Some(is_pinned) = input.is_pinned {
        note.is_pinned = is_pinned;
    }
    if let Some(is_published) = input.is_published {
        note.is_published = is_published;
    }
    note.updated_at = note.updated_at.max(now);
    note
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::store::{memory::MemoryStore, NoteStore, TagStore};

    fn repository(store: &Arc<MemoryStore>) -> NoteRepository {
        NoteRepository::new(store.clone(), Notifier::default(), RepositoryOptions::default())
    }

    fn save(content: &str, tags: &[&str]) -> SaveNote {
        SaveNote {
            content: Some(content.into()),
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    fn tag_names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_save_creates_and_derives_tags() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = repository(&store);
        let mut rx = repo.events().subscribe();

        let note = repo
            .save(save("Meeting notes #work/planning and #ideas", &["#work/planning", "urgent"]))
            .await?;

        assert_eq!(note.title, UNTITLED);
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(tag_names(&repo.tags().await?), vec!["ideas", "planning", "urgent", "work"]);
        assert_eq!(rx.try_recv().ok(), Some(ChangeEvent::NotesChanged));
        assert_eq!(rx.try_recv().ok(), Some(ChangeEvent::TagsChanged));
        Ok(())
    }

    #[tokio::test]
    async fn test_save_merges_existing_and_bumps_timestamp() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = repository(&store);

        let first = repo
            .save(SaveNote {
                title: Some("Plan".into()),
                ..save("body", &[])
            })
            .await?;

        let second = repo
            .save(SaveNote {
                id: Some(first.id),
                is_pinned: Some(true),
                ..Default::default()
            })
            .await?;

        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Plan");
        assert_eq!(second.content, "body");
        assert!(second.is_pinned);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(repo.list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_updated_at_never_goes_backwards() -> Result<()> {
        let future = Utc::now() + ChronoDuration::days(1);
        let existing = Note {
            updated_at: future,
            ..Note::new(Uuid::now_v7(), Utc::now())
        };
        let store = Arc::new(MemoryStore::with_notes(vec![existing.clone()]));

        let saved = repository(&store)
            .save(SaveNote {
                id: Some(existing.id),
                ..Default::default()
            })
            .await?;

        assert_eq!(saved.updated_at, future);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_id_gets_fresh_id() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let unknown = Uuid::now_v7();

        let note = repository(&store)
            .save(SaveNote {
                id: Some(unknown),
                ..save("x", &[])
            })
            .await?;

        assert_ne!(note.id, unknown);
        Ok(())
    }

    #[tokio::test]
    async fn test_unchanged_names_do_not_rewrite_tags() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = repository(&store);

        let note = repo.save(save("#work", &[])).await?;
        assert_eq!(store.tag_writes(), 1);

        repo.save(SaveNote {
            id: Some(note.id),
            content: Some("#work again".into()),
            ..Default::default()
        })
        .await?;
        assert_eq!(store.tag_writes(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_note_does_not_block_others() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let broken: Note = serde_json::from_value(serde_json::json!({
            "id": Uuid::now_v7(),
            "content": "no hashtags",
            "tags": {"not": "a list"},
        }))
        .map_err(|e| Error::Unexpected(e.to_string()))?;
        store.upsert_note(&broken).await?;

        let repo = repository(&store);
        repo.save(save("#kept", &["also"])).await?;

        assert_eq!(tag_names(&repo.tags().await?), vec!["also", "kept"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_leaves_tags_until_next_derivation() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = repository(&store);

        let doomed = repo.save(save("#temporary", &[])).await?;
        repo.save(save("#keep", &[])).await?;

        let deleted = repo.delete(doomed.id).await?;
        assert_eq!(deleted.id, doomed.id);
        assert_eq!(repo.list().await?.len(), 1);
        assert_eq!(tag_names(&repo.tags().await?), vec!["keep", "temporary"]);

        assert!(repo.rebuild_tags().await?.changed());
        assert_eq!(tag_names(&repo.tags().await?), vec!["keep"]);

        assert!(matches!(repo.delete(doomed.id).await, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_tag_failure_does_not_fail_save() -> Result<()> {
        struct NoTags(MemoryStore);

        #[async_trait::async_trait]
        impl NoteStore for NoTags {
            async fn list_notes(&self) -> crate::store::Result<Vec<Note>> {
                self.0.list_notes().await
            }
            async fn upsert_note(&self, note: &Note) -> crate::store::Result<()> {
                self.0.upsert_note(note).await
            }
            async fn delete_note(&self, id: Uuid) -> crate::store::Result<()> {
                self.0.delete_note(id).await
            }
            async fn get_published(&self, id: Uuid) -> crate::store::Result<Option<Note>> {
                self.0.get_published(id).await
            }
        }

        #[async_trait::async_trait]
        impl TagStore for NoTags {
            async fn list_tags(&self) -> crate::store::Result<Vec<Tag>> {
                Err(crate::store::Error::Unavailable("tags".into()))
            }
            async fn replace_tags(&self, _tags: &[Tag]) -> crate::store::Result<()> {
                Err(crate::store::Error::Unavailable("tags".into()))
            }
        }

        let repo = NoteRepository::new(
            Arc::new(NoTags(MemoryStore::default())),
            Notifier::default(),
            RepositoryOptions::default(),
        );

        let note = repo.save(save("#a", &[])).await?;
        assert_eq!(repo.get(note.id).await?.content, "#a");
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_reads() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = NoteRepository::new(
            store.clone(),
            Notifier::default(),
            RepositoryOptions {
                cache_ttl: Duration::from_secs(60),
                ..Default::default()
            },
        );

        repo.list().await?;
        repo.list().await?;
        assert_eq!(store.note_reads(), 1);

        repo.events().notify(ChangeEvent::NotesChanged);
        repo.list().await?;
        assert_eq!(store.note_reads(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_reads_serve_empty_collections() -> Result<()> {
        let store = Arc::new(MemoryStore::with_notes(vec![Note::new(Uuid::now_v7(), Utc::now())]));
        store.set_failing(true);
        let repo = repository(&store);

        assert!(repo.list().await?.is_empty());
        assert!(repo.tags().await?.is_empty());
        assert!(repo.save(save("#x", &[])).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_published_filter() -> Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = repository(&store);

        let draft = repo.save(save("secret", &[])).await?;
        let public = repo
            .save(SaveNote {
                is_published: Some(true),
                ..save("hello", &[])
            })
            .await?;

        assert!(matches!(repo.published(draft.id).await, Err(Error::NotFound(_))));
        assert_eq!(repo.published(public.id).await?.content, "hello");
        Ok(())
    }
}
