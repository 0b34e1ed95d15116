//! Decides whether a rebuilt tag set is persisted and announced.

use std::sync::Arc;

use serde::Deserialize;

use super::{tree, Tag};
use crate::{
    events::{ChangeEvent, Notifier},
    notes::Note,
    store::{self, Store},
};

/// What a tag set is compared by.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Sorted tag names. A tag moving under another parent goes unnoticed.
    #[default]
    Names,
    /// Sorted full paths, also detects moves.
    Lineage,
}

pub fn fingerprint(tags: &[Tag], mode: FingerprintMode) -> Vec<String> {
    match mode {
        FingerprintMode::Names => {
            let mut names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
            names.sort();
            names
        }
        FingerprintMode::Lineage => tree::paths(tags),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Unchanged { tags: Vec<Tag> },
    Replaced { tags: Vec<Tag> },
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }

    pub fn into_tags(self) -> Vec<Tag> {
        match self {
            Self::Unchanged { tags } | Self::Replaced { tags } => tags,
        }
    }
}

#[derive(Clone)]
pub struct TagReconciler {
    store: Arc<dyn Store>,
    events: Notifier,
    mode: FingerprintMode,
}

impl TagReconciler {
    pub fn new(store: Arc<dyn Store>, events: Notifier, mode: FingerprintMode) -> Self {
        Self { store, events, mode }
    }

    /// Rebuilds tags from `notes` and replaces the stored set when its fingerprint changed.
    ///
    /// On `Unchanged` the stored set is returned as is.
    pub async fn reconcile(&self, notes: &[Note]) -> store::Result<Reconciliation> {
        let previous = match self.store.list_tags().await {
            Ok(tags) => tags,
            Err(error) => {
                tracing::error!(%error, "failed to read stored tags, treating as empty");
                Vec::new()
            }
        };

        let rebuilt = tree::build_tag_tree(notes, &previous);

        if fingerprint(&rebuilt, self.mode) == fingerprint(&previous, self.mode) {
            tracing::debug!(tags = previous.len(), "tags unchanged");
            let mut previous = previous;
            tree::sort_tags(&mut previous);
            return Ok(Reconciliation::Unchanged { tags: previous });
        }

        self.store.replace_tags(&rebuilt).await?;
        tracing::info!(before = previous.len(), after = rebuilt.len(), "tags replaced");
        self.events.notify(ChangeEvent::TagsChanged);

        Ok(Reconciliation::Replaced { tags: rebuilt })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::store::{memory::MemoryStore, TagStore};

    fn note(content: &str) -> Note {
        Note {
            content: content.into(),
            ..Note::new(Uuid::now_v7(), Utc::now())
        }
    }

    fn reconciler(store: &Arc<MemoryStore>, events: &Notifier, mode: FingerprintMode) -> TagReconciler {
        TagReconciler::new(store.clone(), events.clone(), mode)
    }

    #[tokio::test]
    async fn test_replaces_and_notifies_on_change() -> store::Result<()> {
        let store = Arc::new(MemoryStore::default());
        let events = Notifier::default();
        let mut rx = events.subscribe();

        let outcome = reconciler(&store, &events, FingerprintMode::Names)
            .reconcile(&[note("#work/planning #ideas")])
            .await?;

        assert!(outcome.changed());
        assert_eq!(store.tag_writes(), 1);
        assert_eq!(store.list_tags().await?.len(), 3);
        assert_eq!(rx.try_recv().ok(), Some(ChangeEvent::TagsChanged));
        Ok(())
    }

    #[tokio::test]
    async fn test_same_names_skip_write_and_notification() -> store::Result<()> {
        let store = Arc::new(MemoryStore::default());
        let events = Notifier::default();
        let reconciler = reconciler(&store, &events, FingerprintMode::Names);

        reconciler.reconcile(&[note("#work/planning #home")]).await?;
        let mut rx = events.subscribe();

        let outcome = reconciler.reconcile(&[note("#work/planning"), note("#home #work")]).await?;
        assert!(!outcome.changed());

        // "planning" moves from work to home: names alone stay the same
        let outcome = reconciler.reconcile(&[note("#home/planning #work")]).await?;
        assert!(!outcome.changed());

        assert_eq!(store.tag_writes(), 1);
        assert!(rx.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_lineage_detects_moves() -> store::Result<()> {
        let store = Arc::new(MemoryStore::default());
        let events = Notifier::default();
        let reconciler = reconciler(&store, &events, FingerprintMode::Lineage);

        reconciler.reconcile(&[note("#work/planning #home")]).await?;
        let outcome = reconciler.reconcile(&[note("#home/planning #work")]).await?;

        assert!(outcome.changed());
        assert_eq!(store.tag_writes(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_removed_tags_are_dropped() -> store::Result<()> {
        let store = Arc::new(MemoryStore::default());
        let reconciler = reconciler(&store, &Notifier::default(), FingerprintMode::Names);

        reconciler.reconcile(&[note("#a #b")]).await?;
        let outcome = reconciler.reconcile(&[note("#a")]).await?;

        assert!(outcome.changed());
        let names: Vec<_> = store.list_tags().await?.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_failure_is_returned() {
        let store = Arc::new(MemoryStore::default());
        store.set_failing(true);

        let result = reconciler(&store, &Notifier::default(), FingerprintMode::Names)
            .reconcile(&[note("#a")])
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_fingerprints() {
        let tags = tree::build_tag_tree(&[note("#b/x #a/x")], &[]);
        assert_eq!(fingerprint(&tags, FingerprintMode::Names), vec!["a", "b", "x", "x"]);
        assert_eq!(fingerprint(&tags, FingerprintMode::Lineage), vec!["a", "a/x", "b", "b/x"]);
    }
}
