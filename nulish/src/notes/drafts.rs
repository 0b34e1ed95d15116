//! Editor autosave: keystroke-driven saves collapse into one save per quiet period.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use uuid::Uuid;

use super::{NoteRepository, SaveDraft, SaveNote};
use crate::debounce::Debouncer;

#[derive(Clone)]
pub struct DraftSaver {
    repo: NoteRepository,
    delay: Duration,
    pending: Arc<Mutex<HashMap<Uuid, Debouncer<SaveNote>>>>,
}

impl DraftSaver {
    pub fn new(repo: NoteRepository, delay: Duration) -> Self {
        Self {
            repo,
            delay,
            pending: Arc::default(),
        }
    }

    /// Queues `draft` for note `id`, replacing any draft still waiting.
    pub fn push(&self, id: Uuid, draft: SaveDraft) {
        let input = SaveNote {
            id: Some(id),
            title: draft.title,
            content: draft.content,
            tags: draft.tags,
            ..Default::default()
        };

        let mut pending = self.pending.lock();
        let debouncer = pending.entry(id).or_insert_with(|| self.debouncer(id));
        if !debouncer.push(input.clone()) {
            // timer task is gone, start over
            let debouncer = self.debouncer(id);
            debouncer.push(input);
            pending.insert(id, debouncer);
        }
    }

    fn debouncer(&self, id: Uuid) -> Debouncer<SaveNote> {
        let repo = self.repo.clone();
        let pending = self.pending.clone();

        Debouncer::spawn(self.delay, move |input: SaveNote| {
            // a later push starts a fresh debouncer; dropping this one flushes anything queued meanwhile
            pending.lock().remove(&id);
            let repo = repo.clone();
            async move {
                match repo.save(input).await {
                    Ok(note) => tracing::debug!(note_id = %note.id, "draft saved"),
                    Err(error) => tracing::error!(%error, note_id = %id, "draft save failed"),
                }
            }
        })
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        events::Notifier,
        notes::RepositoryOptions,
        store::memory::MemoryStore,
    };

    use super::*;

    #[tokio::test]
    async fn test_rapid_drafts_collapse_into_one_save() -> crate::Result<()> {
        let store = Arc::new(MemoryStore::default());
        let repo = NoteRepository::new(store.clone(), Notifier::default(), RepositoryOptions::default());
        let note = repo
            .save(SaveNote {
                content: Some("start".into()),
                ..Default::default()
            })
            .await?;
        let writes_before = store.note_writes();

        let drafts = DraftSaver::new(repo.clone(), Duration::from_millis(50));
        for content in ["s", "st", "sta", "star #done"] {
            drafts.push(
                note.id,
                SaveDraft {
                    content: Some(content.into()),
                    ..Default::default()
                },
            );
        }
        assert_eq!(drafts.pending(), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(store.note_writes(), writes_before + 1);
        assert_eq!(repo.get(note.id).await?.content, "star #done");
        assert_eq!(repo.tags().await?.len(), 1);
        assert_eq!(drafts.pending(), 0);
        Ok(())
    }
}
